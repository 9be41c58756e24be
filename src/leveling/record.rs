//! User Level Record Types
//!
//! One record per username. A record that was never written is
//! indistinguishable from the default: level 0 with no action history.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a moderator action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelAction {
    Promote,
    Demote,
}

impl LevelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelAction::Promote => "promote",
            LevelAction::Demote => "demote",
        }
    }

    /// Past-tense verb used in notices ("Promoted", "Demoted")
    pub fn past_tense(&self) -> &'static str {
        match self {
            LevelAction::Promote => "Promoted",
            LevelAction::Demote => "Demoted",
        }
    }
}

impl fmt::Display for LevelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promote" => Ok(LevelAction::Promote),
            "demote" => Ok(LevelAction::Demote),
            other => Err(format!("unknown level action: {}", other)),
        }
    }
}

/// Persisted leveling state for a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLevelRecord {
    pub username: String,

    /// Current level (index into the flair level table)
    pub level: i32,

    /// Most recent action, absent until the first promote/demote
    pub last_action: Option<LevelAction>,

    /// Epoch milliseconds of `last_action`, set iff `last_action` is set
    pub last_action_at_ms: Option<i64>,
}

impl UserLevelRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            level: 0,
            last_action: None,
            last_action_at_ms: None,
        }
    }
}

/// Format an epoch-ms timestamp as `YYYY-MM-DD HH:MM:SS` in UTC
pub fn format_action_time(at_ms: i64) -> String {
    match Utc.timestamp_millis_opt(at_ms).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{}ms", at_ms),
    }
}
