//! Leveling Engine
//!
//! The single decision point for level transitions. Every bound check in the
//! crate routes through [`compute_transition`]; callers never clamp levels
//! themselves.

use crate::error::{LadderError, LadderResult};
use crate::leveling::LevelAction;

/// Result of asking the engine to move a user one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The user moves to `new_level`, exactly one step from the current level
    Advanced(i32),
    /// Promote at the top level or demote at level 0; nothing to write
    AtBoundary,
}

/// Compute the next level for `direction` from `current_level`.
///
/// `current_level` outside `[0, max_level]` means the stored state is
/// corrupted and is reported as [`LadderError::Internal`].
pub fn compute_transition(
    current_level: i32,
    direction: LevelAction,
    max_level: i32,
) -> LadderResult<Transition> {
    if max_level < 0 {
        return Err(LadderError::Internal(format!(
            "max level {} is negative",
            max_level
        )));
    }
    if !(0..=max_level).contains(&current_level) {
        return Err(LadderError::Internal(format!(
            "stored level {} outside of [0, {}]",
            current_level, max_level
        )));
    }

    let transition = match direction {
        LevelAction::Promote if current_level < max_level => {
            Transition::Advanced(current_level + 1)
        }
        LevelAction::Demote if current_level > 0 => Transition::Advanced(current_level - 1),
        _ => Transition::AtBoundary,
    };

    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_and_demote_step_by_one() {
        assert_eq!(
            compute_transition(0, LevelAction::Promote, 3).unwrap(),
            Transition::Advanced(1)
        );
        assert_eq!(
            compute_transition(2, LevelAction::Demote, 3).unwrap(),
            Transition::Advanced(1)
        );
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(
            compute_transition(3, LevelAction::Promote, 3).unwrap(),
            Transition::AtBoundary
        );
        assert_eq!(
            compute_transition(0, LevelAction::Demote, 3).unwrap(),
            Transition::AtBoundary
        );
        // Single-level table: nowhere to go in either direction
        assert_eq!(
            compute_transition(0, LevelAction::Promote, 0).unwrap(),
            Transition::AtBoundary
        );
    }

    #[test]
    fn test_never_leaves_range() {
        for max_level in 0..6 {
            for current in 0..=max_level {
                for direction in [LevelAction::Promote, LevelAction::Demote] {
                    if let Transition::Advanced(next) =
                        compute_transition(current, direction, max_level).unwrap()
                    {
                        assert!((0..=max_level).contains(&next));
                        assert_eq!((next - current).abs(), 1);
                    }
                }
            }
        }
    }

    #[test]
    fn test_promote_then_demote_returns_to_start() {
        let max_level = 4;
        for start in 0..max_level {
            let Transition::Advanced(up) =
                compute_transition(start, LevelAction::Promote, max_level).unwrap()
            else {
                panic!("interior level {} should promote", start);
            };
            let Transition::Advanced(back) =
                compute_transition(up, LevelAction::Demote, max_level).unwrap()
            else {
                panic!("level {} should demote", up);
            };
            assert_eq!(back, start);
        }
    }

    #[test]
    fn test_corrupted_level_is_internal_error() {
        assert!(matches!(
            compute_transition(-1, LevelAction::Promote, 2),
            Err(LadderError::Internal(_))
        ));
        assert!(matches!(
            compute_transition(5, LevelAction::Demote, 2),
            Err(LadderError::Internal(_))
        ));
    }
}
