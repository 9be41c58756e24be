//! In-memory level store (dev mode and tests)

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::database::{CasOutcome, UserLevelStore};
use crate::error::LadderResult;
use crate::leveling::{LevelAction, UserLevelRecord};

/// Level store backed by a sharded concurrent map.
///
/// Compare-and-set runs while holding the entry's shard lock, which makes
/// the check and the three-field write a single atomic step.
#[derive(Debug, Default)]
pub struct InMemoryLevelStore {
    records: DashMap<String, UserLevelRecord>,
}

impl InMemoryLevelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing compare-and-set (fixtures only)
    pub fn insert_record(&self, record: UserLevelRecord) {
        self.records.insert(record.username.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl UserLevelStore for InMemoryLevelStore {
    async fn get(&self, username: &str) -> LadderResult<UserLevelRecord> {
        Ok(self
            .records
            .get(username)
            .map(|record| record.value().clone())
            .unwrap_or_else(|| UserLevelRecord::new(username)))
    }

    async fn compare_and_set(
        &self,
        username: &str,
        expected_level: i32,
        new_level: i32,
        action: LevelAction,
        at_ms: i64,
    ) -> LadderResult<CasOutcome> {
        match self.records.entry(username.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.level != expected_level {
                    debug!(
                        username = %username,
                        expected = expected_level,
                        stored = record.level,
                        "Level compare-and-set conflict"
                    );
                    return Ok(CasOutcome::Conflict);
                }
                record.level = new_level;
                record.last_action = Some(action);
                record.last_action_at_ms =
                    Some(record.last_action_at_ms.map_or(at_ms, |prev| prev.max(at_ms)));
            }
            Entry::Vacant(vacant) => {
                if expected_level != 0 {
                    return Ok(CasOutcome::Conflict);
                }
                vacant.insert(UserLevelRecord {
                    username: username.to_string(),
                    level: new_level,
                    last_action: Some(action),
                    last_action_at_ms: Some(at_ms),
                });
            }
        }

        Ok(CasOutcome::Applied)
    }
}
