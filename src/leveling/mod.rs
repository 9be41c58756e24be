//! Leveling & Audit State Machine
//!
//! Moderators move users up and down an ordered ladder of flairs. Each user
//! has one stored level plus the last action taken on them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌────────────────────┐     ┌─────────────────┐
//! │ IdentityResolver │────►│ ActionOrchestrator │◄────│ FlairLevelTable │
//! │ (post → author)  │     │ (promote / demote) │     │ (level → flair) │
//! └──────────────────┘     └────────────────────┘     └─────────────────┘
//!                            │       │        │
//!                            ▼       ▼        ▼
//!               compute_transition  UserLevelStore  BadgeAssigner
//!               (pure, ±1 step)     (compare-and-set) (best effort)
//! ```
//!
//! ## Level Model
//!
//! - Every user starts at level 0 with no history
//! - Promote/demote move exactly one level; the ends of the table are
//!   boundaries that leave the record untouched
//! - Writes are conditional on the level that was read, and retried a
//!   bounded number of times when another moderator got there first

pub mod engine;
mod orchestrator;
mod record;
mod table;

pub use engine::{Transition, compute_transition};
pub use orchestrator::{
    ActionOrchestrator, ActionOutcome, DEFAULT_MAX_CAS_ATTEMPTS, LadderSettings, LastActionReport,
    ReapplyOutcome,
};
pub use record::{LevelAction, UserLevelRecord, format_action_time};
pub use table::{FlairLevelTable, is_valid_flair_id};
