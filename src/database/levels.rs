//! Level Repository - PostgreSQL persistence for user levels
//!
//! One row per username holds the level and the last-action audit fields,
//! so the three logical keys are always written as a unit.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::database::{CasOutcome, UserLevelStore};
use crate::error::{LadderError, LadderResult};
use crate::leveling::{LevelAction, UserLevelRecord};

pub struct LevelRepository {
    pool: PgPool,
}

impl LevelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the ladder schema and the user_levels table
    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing ladder schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS ladder")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create ladder schema: {}", e))?;

        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS ladder.user_levels (
                username VARCHAR(255) PRIMARY KEY,
                level INTEGER NOT NULL DEFAULT 0 CHECK (level >= 0),
                last_action VARCHAR(16),
                last_action_at_ms BIGINT,
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                CHECK ((last_action IS NULL) = (last_action_at_ms IS NULL))
            )
        "#)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create user_levels table: {}", e))?;

        info!("Ladder schema initialized");
        Ok(())
    }

    async fn fetch_record(&self, username: &str) -> Result<Option<UserLevelRecord>, String> {
        let row = sqlx::query(r#"
            SELECT username, level, last_action, last_action_at_ms
            FROM ladder.user_levels
            WHERE username = $1
        "#)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get user level: {}", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let last_action: Option<String> = row.get("last_action");
        let last_action = match last_action {
            Some(raw) => match raw.parse::<LevelAction>() {
                Ok(action) => Some(action),
                Err(e) => {
                    warn!(username = %username, "Ignoring stored last action: {}", e);
                    None
                }
            },
            None => None,
        };
        let last_action_at_ms: Option<i64> = row.get("last_action_at_ms");

        Ok(Some(UserLevelRecord {
            username: row.get("username"),
            level: row.get("level"),
            last_action_at_ms: last_action.and(last_action_at_ms),
            last_action,
        }))
    }

    /// Insert-or-update guarded by the expected level. Used when the caller
    /// believes the user is still at level 0, which covers a missing row.
    async fn upsert_from_zero(
        &self,
        username: &str,
        new_level: i32,
        action: LevelAction,
        at_ms: i64,
    ) -> Result<u64, String> {
        let result = sqlx::query(r#"
            INSERT INTO ladder.user_levels (username, level, last_action, last_action_at_ms, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (username) DO UPDATE SET
                level = EXCLUDED.level,
                last_action = EXCLUDED.last_action,
                last_action_at_ms = GREATEST(EXCLUDED.last_action_at_ms, ladder.user_levels.last_action_at_ms),
                updated_at = EXCLUDED.updated_at
            WHERE ladder.user_levels.level = 0
        "#)
        .bind(username)
        .bind(new_level)
        .bind(action.as_str())
        .bind(at_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert user level: {}", e))?;

        Ok(result.rows_affected())
    }

    async fn update_from(
        &self,
        username: &str,
        expected_level: i32,
        new_level: i32,
        action: LevelAction,
        at_ms: i64,
    ) -> Result<u64, String> {
        let result = sqlx::query(r#"
            UPDATE ladder.user_levels SET
                level = $3,
                last_action = $4,
                last_action_at_ms = GREATEST($5, last_action_at_ms),
                updated_at = NOW()
            WHERE username = $1 AND level = $2
        "#)
        .bind(username)
        .bind(expected_level)
        .bind(new_level)
        .bind(action.as_str())
        .bind(at_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to update user level: {}", e))?;

        Ok(result.rows_affected())
    }

    /// Number of users with a stored record
    pub async fn count_users(&self) -> Result<i64, String> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM ladder.user_levels")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| format!("Failed to count users: {}", e))?;
        Ok(row.get("total"))
    }
}

#[async_trait]
impl UserLevelStore for LevelRepository {
    async fn get(&self, username: &str) -> LadderResult<UserLevelRecord> {
        let record = self.fetch_record(username).await.map_err(LadderError::Store)?;
        Ok(record.unwrap_or_else(|| UserLevelRecord::new(username)))
    }

    async fn compare_and_set(
        &self,
        username: &str,
        expected_level: i32,
        new_level: i32,
        action: LevelAction,
        at_ms: i64,
    ) -> LadderResult<CasOutcome> {
        let affected = if expected_level == 0 {
            self.upsert_from_zero(username, new_level, action, at_ms).await
        } else {
            self.update_from(username, expected_level, new_level, action, at_ms)
                .await
        }
        .map_err(LadderError::Store)?;

        if affected == 0 {
            debug!(
                username = %username,
                expected = expected_level,
                "Level compare-and-set conflict"
            );
            return Ok(CasOutcome::Conflict);
        }

        Ok(CasOutcome::Applied)
    }
}
