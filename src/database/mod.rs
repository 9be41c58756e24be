//! User Level Store
//!
//! Persistence for per-user levels and the last-action audit trail. All
//! writes go through [`UserLevelStore::compare_and_set`]; there is no plain
//! setter, so concurrent moderators can never overwrite each other's change.

pub mod levels;
pub mod memory;
pub mod pool;

use async_trait::async_trait;

use crate::error::LadderResult;
use crate::leveling::{LevelAction, UserLevelRecord};

pub use levels::LevelRepository;
pub use memory::InMemoryLevelStore;
pub use pool::DatabasePool;

/// Outcome of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Level, action and timestamp were written together
    Applied,
    /// The stored level no longer matched the expected level; nothing written
    Conflict,
}

#[async_trait]
pub trait UserLevelStore: Send + Sync {
    /// Current record for `username`, or the level-0 default if none exists.
    /// Never creates a record.
    async fn get(&self, username: &str) -> LadderResult<UserLevelRecord>;

    /// Write `new_level` with its audit fields iff the stored level (0 when
    /// absent) equals `expected_level`.
    ///
    /// The stored timestamp is `max(at_ms, previous)` so that it never moves
    /// backwards even if writers' clocks disagree.
    async fn compare_and_set(
        &self,
        username: &str,
        expected_level: i32,
        new_level: i32,
        action: LevelAction,
        at_ms: i64,
    ) -> LadderResult<CasOutcome>;
}
