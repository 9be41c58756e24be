//! Error types for leveling operations.
//!
//! Reaching a level boundary is not an error (see
//! [`ActionOutcome::Boundary`](crate::leveling::ActionOutcome::Boundary)) and
//! neither is a failed badge assignment, which is reported as a partial
//! success after the level change has been persisted.

use thiserror::Error;

/// Errors that can occur while promoting, demoting or querying a user.
#[derive(Debug, Error)]
pub enum LadderError {
    /// The targeted post/comment or its author could not be found.
    #[error("could not resolve author: {0}")]
    Resolution(String),

    /// The community or flair level table is missing or malformed.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Every compare-and-set attempt lost against a concurrent writer.
    #[error("level update for '{username}' conflicted {attempts} times, giving up")]
    TransientStoreConflict { username: String, attempts: u32 },

    /// The level store failed to read or write.
    #[error("level store error: {0}")]
    Store(String),

    /// The identity collaborator was unreachable or returned garbage.
    #[error("collaborator unavailable: {0}")]
    Collaborator(String),

    /// An invariant was violated, usually a corrupted stored level.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LadderError {
    /// Short moderator-facing message for this failure.
    pub fn notice(&self) -> String {
        match self {
            LadderError::Resolution(_) => {
                "Could not find the author of that post or comment".to_string()
            }
            LadderError::Configuration(_) => {
                "The flair ladder is not configured correctly. Please check the app settings."
                    .to_string()
            }
            LadderError::TransientStoreConflict { .. } => {
                "Another moderator updated this user at the same time. Please try again."
                    .to_string()
            }
            LadderError::Store(_) | LadderError::Collaborator(_) | LadderError::Internal(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }

    /// Returns true if retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LadderError::TransientStoreConflict { .. }
                | LadderError::Store(_)
                | LadderError::Collaborator(_)
        )
    }
}

pub type LadderResult<T> = Result<T, LadderError>;
