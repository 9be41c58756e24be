//! Action Orchestrator
//!
//! Runs a moderator action end to end: resolve the author, read the stored
//! level, ask the engine for the next level, persist it with compare-and-set,
//! then apply the matching flair. The level write is authoritative; flair
//! assignment is best effort and its failure is reported, not rolled back.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::database::{CasOutcome, UserLevelStore};
use crate::error::{LadderError, LadderResult};
use crate::leveling::engine::{Transition, compute_transition};
use crate::leveling::record::format_action_time;
use crate::leveling::{FlairLevelTable, LevelAction};
use crate::reddit::{BadgeAssigner, CollaboratorError, ContentRef, IdentityResolver};

/// Compare-and-set attempts before giving up on a contended user
pub const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 3;

/// Validated community settings the orchestrator is built from
#[derive(Debug, Clone)]
pub struct LadderSettings {
    community: String,
    table: FlairLevelTable,
    max_cas_attempts: u32,
}

impl LadderSettings {
    pub fn new(
        community: impl Into<String>,
        table: FlairLevelTable,
        max_cas_attempts: u32,
    ) -> LadderResult<Self> {
        let community = community.into().trim().to_string();
        if community.is_empty() {
            return Err(LadderError::Configuration(
                "community name is required".to_string(),
            ));
        }
        if max_cas_attempts == 0 {
            return Err(LadderError::Configuration(
                "max compare-and-set attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            community,
            table,
            max_cas_attempts,
        })
    }

    pub fn community(&self) -> &str {
        &self.community
    }

    pub fn table(&self) -> &FlairLevelTable {
        &self.table
    }

    pub fn max_cas_attempts(&self) -> u32 {
        self.max_cas_attempts
    }
}

/// Result of a promote or demote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Level persisted and flair applied
    Success {
        username: String,
        action: LevelAction,
        level: i32,
        flair_id: String,
        badge_label: Option<String>,
    },
    /// Level persisted, flair could not be applied
    BadgeNotApplied {
        username: String,
        action: LevelAction,
        level: i32,
        reason: String,
    },
    /// Already at the top (promote) or bottom (demote); nothing written
    Boundary {
        username: String,
        action: LevelAction,
        level: i32,
    },
}

impl ActionOutcome {
    pub fn username(&self) -> &str {
        match self {
            ActionOutcome::Success { username, .. }
            | ActionOutcome::BadgeNotApplied { username, .. }
            | ActionOutcome::Boundary { username, .. } => username,
        }
    }

    pub fn level(&self) -> i32 {
        match self {
            ActionOutcome::Success { level, .. }
            | ActionOutcome::BadgeNotApplied { level, .. }
            | ActionOutcome::Boundary { level, .. } => *level,
        }
    }

    /// True only when both the level and the flair were updated
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success { .. })
    }

    pub fn notice(&self) -> String {
        match self {
            ActionOutcome::Success {
                username,
                action,
                level,
                badge_label,
                ..
            } => match badge_label {
                Some(label) => format!(
                    "{} user {} to flair: {}",
                    action.past_tense(),
                    username,
                    label
                ),
                None => format!("{} user {} to level {}", action.past_tense(), username, level),
            },
            ActionOutcome::BadgeNotApplied {
                username,
                action,
                level,
                reason,
            } => format!(
                "{} user {} to level {}, but the flair could not be applied: {}",
                action.past_tense(),
                username,
                level,
                reason
            ),
            ActionOutcome::Boundary { action, .. } => match action {
                LevelAction::Promote => "No more levels to promote to".to_string(),
                LevelAction::Demote => "No more levels to demote to".to_string(),
            },
        }
    }
}

/// Result of the last-action query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LastActionReport {
    NoHistory {
        username: String,
    },
    LastAction {
        username: String,
        action: LevelAction,
        at_ms: i64,
    },
}

impl LastActionReport {
    pub fn notice(&self) -> String {
        match self {
            LastActionReport::NoHistory { username } => {
                format!("No promotion/demotion history found for {}", username)
            }
            LastActionReport::LastAction {
                username,
                action,
                at_ms,
            } => format!(
                "Last action for {} was a {} on {} (UTC)",
                username,
                action,
                format_action_time(*at_ms)
            ),
        }
    }
}

/// Result of re-applying the flair for a user's stored level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReapplyOutcome {
    Applied {
        username: String,
        level: i32,
        flair_id: String,
        badge_label: Option<String>,
    },
    NotApplied {
        username: String,
        level: i32,
        reason: String,
    },
}

impl ReapplyOutcome {
    pub fn notice(&self) -> String {
        match self {
            ReapplyOutcome::Applied {
                username,
                badge_label: Some(label),
                ..
            } => format!("Reapplied flair {} to user {}", label, username),
            ReapplyOutcome::Applied {
                username, level, ..
            } => format!("Reapplied level {} flair to user {}", level, username),
            ReapplyOutcome::NotApplied {
                username, reason, ..
            } => format!("Could not reapply flair for {}: {}", username, reason),
        }
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct ActionOrchestrator {
    settings: LadderSettings,
    identity: Arc<dyn IdentityResolver>,
    badges: Arc<dyn BadgeAssigner>,
    store: Arc<dyn UserLevelStore>,
    clock: Clock,
}

impl ActionOrchestrator {
    pub fn new(
        settings: LadderSettings,
        identity: Arc<dyn IdentityResolver>,
        badges: Arc<dyn BadgeAssigner>,
        store: Arc<dyn UserLevelStore>,
    ) -> Self {
        Self {
            settings,
            identity,
            badges,
            store,
            clock: Arc::new(|| Utc::now().timestamp_millis()),
        }
    }

    /// Replace the wall clock (epoch milliseconds)
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn settings(&self) -> &LadderSettings {
        &self.settings
    }

    pub async fn promote(&self, target: &ContentRef) -> LadderResult<ActionOutcome> {
        self.change_level(target, LevelAction::Promote).await
    }

    pub async fn demote(&self, target: &ContentRef) -> LadderResult<ActionOutcome> {
        self.change_level(target, LevelAction::Demote).await
    }

    pub async fn query_last_action(&self, target: &ContentRef) -> LadderResult<LastActionReport> {
        let username = self.resolve_username(target).await?;
        let record = self.store.get(&username).await?;

        Ok(match (record.last_action, record.last_action_at_ms) {
            (Some(action), Some(at_ms)) => LastActionReport::LastAction {
                username,
                action,
                at_ms,
            },
            _ => LastActionReport::NoHistory { username },
        })
    }

    /// Apply the flair for the user's currently stored level without
    /// touching the level or the audit fields.
    pub async fn reapply_badge(&self, target: &ContentRef) -> LadderResult<ReapplyOutcome> {
        let username = self.resolve_username(target).await?;
        let record = self.store.get(&username).await?;
        // Validates the stored level the same way a transition would
        compute_transition(record.level, LevelAction::Promote, self.max_level())?;

        Ok(match self.apply_badge(&username, record.level).await {
            Ok((flair_id, badge_label)) => ReapplyOutcome::Applied {
                username,
                level: record.level,
                flair_id,
                badge_label,
            },
            Err(reason) => ReapplyOutcome::NotApplied {
                username,
                level: record.level,
                reason,
            },
        })
    }

    fn max_level(&self) -> i32 {
        self.settings.table.max_level()
    }

    async fn resolve_username(&self, target: &ContentRef) -> LadderResult<String> {
        match self.identity.resolve_author(target).await {
            Ok(author) => Ok(author.username),
            Err(CollaboratorError::NotFound(detail)) => {
                info!(content = %target, "Could not resolve author: {}", detail);
                Err(LadderError::Resolution(detail))
            }
            Err(CollaboratorError::Unavailable(detail)) => {
                warn!(content = %target, "Identity lookup unavailable: {}", detail);
                Err(LadderError::Collaborator(detail))
            }
        }
    }

    async fn change_level(
        &self,
        target: &ContentRef,
        action: LevelAction,
    ) -> LadderResult<ActionOutcome> {
        let username = self.resolve_username(target).await?;
        let max_attempts = self.settings.max_cas_attempts;
        let mut attempts = 0;

        let new_level = loop {
            attempts += 1;
            let record = self.store.get(&username).await?;

            let new_level = match compute_transition(record.level, action, self.max_level())? {
                Transition::AtBoundary => {
                    info!(
                        username = %username,
                        action = %action,
                        level = record.level,
                        "Level boundary reached, nothing to change"
                    );
                    return Ok(ActionOutcome::Boundary {
                        username,
                        action,
                        level: record.level,
                    });
                }
                Transition::Advanced(new_level) => new_level,
            };

            let at_ms = (self.clock)();
            match self
                .store
                .compare_and_set(&username, record.level, new_level, action, at_ms)
                .await?
            {
                CasOutcome::Applied => break new_level,
                CasOutcome::Conflict if attempts < max_attempts => {
                    debug!(
                        username = %username,
                        attempt = attempts,
                        "Concurrent level update detected, retrying"
                    );
                }
                CasOutcome::Conflict => {
                    warn!(
                        username = %username,
                        attempts = attempts,
                        "Giving up on contended level update"
                    );
                    return Err(LadderError::TransientStoreConflict { username, attempts });
                }
            }
        };

        info!(
            username = %username,
            action = %action,
            level = new_level,
            "Level updated"
        );

        Ok(match self.apply_badge(&username, new_level).await {
            Ok((flair_id, badge_label)) => ActionOutcome::Success {
                username,
                action,
                level: new_level,
                flair_id,
                badge_label,
            },
            Err(reason) => ActionOutcome::BadgeNotApplied {
                username,
                action,
                level: new_level,
                reason,
            },
        })
    }

    /// Best-effort flair assignment. Errors come back as a reason string.
    async fn apply_badge(
        &self,
        username: &str,
        level: i32,
    ) -> Result<(String, Option<String>), String> {
        let Some(flair_id) = self.settings.table.flair_for_level(level) else {
            warn!(username = %username, level = level, "No flair configured for level");
            return Err(format!("no flair is configured for level {}", level));
        };

        match self
            .badges
            .assign_badge(flair_id, username, &self.settings.community)
            .await
        {
            Ok(label) => Ok((flair_id.to_string(), label)),
            Err(e) => {
                warn!(
                    username = %username,
                    flair_id = %flair_id,
                    level = level,
                    "Flair assignment failed, level change kept: {}",
                    e
                );
                Err(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryLevelStore;
    use crate::leveling::UserLevelRecord;
    use crate::reddit::ResolvedAuthor;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    const FLAIRS: [&str; 3] = [
        "00000000-0000-4000-8000-000000000000",
        "11111111-1111-4111-8111-111111111111",
        "22222222-2222-4222-8222-222222222222",
    ];

    struct FixedAuthor(&'static str);

    #[async_trait]
    impl IdentityResolver for FixedAuthor {
        async fn resolve_author(
            &self,
            target: &ContentRef,
        ) -> Result<ResolvedAuthor, CollaboratorError> {
            if target.id == "missing" {
                return Err(CollaboratorError::NotFound("no such comment".to_string()));
            }
            Ok(ResolvedAuthor {
                author_id: format!("t2_{}", self.0),
                username: self.0.to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingBadges {
        applied: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl BadgeAssigner for RecordingBadges {
        async fn assign_badge(
            &self,
            badge_id: &str,
            _username: &str,
            _community: &str,
        ) -> Result<Option<String>, CollaboratorError> {
            if self.fail {
                return Err(CollaboratorError::Unavailable("flair service down".to_string()));
            }
            self.applied.lock().unwrap().push(badge_id.to_string());
            Ok(Some(format!("Label {}", &badge_id[..1])))
        }
    }

    fn orchestrator(
        store: Arc<InMemoryLevelStore>,
        badges: Arc<RecordingBadges>,
    ) -> ActionOrchestrator {
        let table = FlairLevelTable::new(FLAIRS.iter().map(|s| s.to_string()).collect()).unwrap();
        let settings = LadderSettings::new("testsub", table, DEFAULT_MAX_CAS_ATTEMPTS).unwrap();
        let tick = Arc::new(AtomicI64::new(1_000));
        ActionOrchestrator::new(settings, Arc::new(FixedAuthor("alice")), badges, store)
            .with_clock(move || tick.fetch_add(10, Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_promote_to_top_then_boundary() {
        let store = Arc::new(InMemoryLevelStore::new());
        let badges = Arc::new(RecordingBadges::default());
        let orch = orchestrator(store.clone(), badges.clone());
        let target = ContentRef::comment("c1");

        let first = orch.promote(&target).await.unwrap();
        assert!(first.is_success());
        assert_eq!(first.level(), 1);
        assert_eq!(first.notice(), "Promoted user alice to flair: Label 1");

        let second = orch.promote(&target).await.unwrap();
        assert_eq!(second.level(), 2);

        let before = store.get("alice").await.unwrap();
        let third = orch.promote(&target).await.unwrap();
        assert!(matches!(third, ActionOutcome::Boundary { level: 2, .. }));
        assert_eq!(third.notice(), "No more levels to promote to");
        assert_eq!(store.get("alice").await.unwrap(), before);

        assert_eq!(*badges.applied.lock().unwrap(), vec![FLAIRS[1], FLAIRS[2]]);
    }

    #[tokio::test]
    async fn test_demote_at_zero_is_boundary_without_write() {
        let store = Arc::new(InMemoryLevelStore::new());
        let orch = orchestrator(store.clone(), Arc::new(RecordingBadges::default()));

        let outcome = orch.demote(&ContentRef::post("p1")).await.unwrap();
        assert_eq!(outcome.notice(), "No more levels to demote to");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_badge_failure_keeps_level() {
        let store = Arc::new(InMemoryLevelStore::new());
        let badges = Arc::new(RecordingBadges {
            fail: true,
            ..RecordingBadges::default()
        });
        let orch = orchestrator(store.clone(), badges);

        let outcome = orch.promote(&ContentRef::comment("c1")).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::BadgeNotApplied { level: 1, .. }));
        assert!(!outcome.is_success());
        assert_eq!(store.get("alice").await.unwrap().level, 1);
    }

    #[tokio::test]
    async fn test_reapply_uses_stored_level() {
        let store = Arc::new(InMemoryLevelStore::new());
        store.insert_record(UserLevelRecord {
            username: "alice".to_string(),
            level: 2,
            last_action: Some(LevelAction::Promote),
            last_action_at_ms: Some(500),
        });
        let badges = Arc::new(RecordingBadges::default());
        let orch = orchestrator(store.clone(), badges.clone());

        let outcome = orch.reapply_badge(&ContentRef::comment("c1")).await.unwrap();
        assert!(matches!(outcome, ReapplyOutcome::Applied { level: 2, .. }));
        assert_eq!(*badges.applied.lock().unwrap(), vec![FLAIRS[2]]);
        assert_eq!(store.get("alice").await.unwrap().last_action_at_ms, Some(500));
    }

    #[tokio::test]
    async fn test_query_last_action() {
        let store = Arc::new(InMemoryLevelStore::new());
        let orch = orchestrator(store.clone(), Arc::new(RecordingBadges::default()));
        let target = ContentRef::comment("c1");

        let report = orch.query_last_action(&target).await.unwrap();
        assert_eq!(
            report,
            LastActionReport::NoHistory {
                username: "alice".to_string()
            }
        );
        assert_eq!(report.notice(), "No promotion/demotion history found for alice");

        orch.promote(&target).await.unwrap();
        let report = orch.query_last_action(&target).await.unwrap();
        assert!(matches!(
            report,
            LastActionReport::LastAction {
                action: LevelAction::Promote,
                at_ms: 1_000,
                ..
            }
        ));
        assert_eq!(
            report.notice(),
            "Last action for alice was a promote on 1970-01-01 00:00:01 (UTC)"
        );
    }

    #[tokio::test]
    async fn test_unresolvable_target() {
        let store = Arc::new(InMemoryLevelStore::new());
        let orch = orchestrator(store.clone(), Arc::new(RecordingBadges::default()));

        let err = orch.promote(&ContentRef::comment("missing")).await.unwrap_err();
        assert!(matches!(err, LadderError::Resolution(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_level_is_internal() {
        let store = Arc::new(InMemoryLevelStore::new());
        store.insert_record(UserLevelRecord {
            username: "alice".to_string(),
            level: 7,
            last_action: None,
            last_action_at_ms: None,
        });
        let orch = orchestrator(store, Arc::new(RecordingBadges::default()));

        let err = orch.demote(&ContentRef::comment("c1")).await.unwrap_err();
        assert!(matches!(err, LadderError::Internal(_)));
    }

    #[test]
    fn test_settings_require_community() {
        let table = FlairLevelTable::new(vec![FLAIRS[0].to_string()]).unwrap();
        assert!(matches!(
            LadderSettings::new("  ", table.clone(), 3),
            Err(LadderError::Configuration(_))
        ));
        assert!(matches!(
            LadderSettings::new("sub", table, 0),
            Err(LadderError::Configuration(_))
        ));
    }
}
