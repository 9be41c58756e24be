//! Flair Level Table
//!
//! Ordered flair template ids, one per level. Validated once when the
//! configuration is loaded so that malformed ids never reach a transition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LadderError, LadderResult};

/// Ordered badge identifiers, index = level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlairLevelTable {
    flair_ids: Vec<String>,
}

impl FlairLevelTable {
    /// Build a table from already-split ids, rejecting malformed entries
    pub fn new(flair_ids: Vec<String>) -> LadderResult<Self> {
        if flair_ids.is_empty() {
            return Err(LadderError::Configuration(
                "at least one flair id is required".to_string(),
            ));
        }

        for (level, flair_id) in flair_ids.iter().enumerate() {
            if !is_valid_flair_id(flair_id) {
                return Err(LadderError::Configuration(format!(
                    "flair id for level {} is not a valid UUID: '{}'",
                    level, flair_id
                )));
            }
        }

        Ok(Self { flair_ids })
    }

    /// Parse a settings value with one id per line (commas also accepted).
    /// Entries are trimmed and blank entries skipped.
    pub fn parse(raw: &str) -> LadderResult<Self> {
        let flair_ids = raw
            .split(['\n', ','])
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(flair_ids)
    }

    pub fn max_level(&self) -> i32 {
        self.flair_ids.len() as i32 - 1
    }

    /// Number of levels, always at least one
    pub fn level_count(&self) -> usize {
        self.flair_ids.len()
    }

    pub fn flair_for_level(&self, level: i32) -> Option<&str> {
        usize::try_from(level)
            .ok()
            .and_then(|idx| self.flair_ids.get(idx))
            .map(String::as_str)
    }

    pub fn flair_ids(&self) -> &[String] {
        &self.flair_ids
    }
}

/// Flair template ids are lowercase hyphenated UUIDs
pub fn is_valid_flair_id(candidate: &str) -> bool {
    match Uuid::parse_str(candidate) {
        Ok(uuid) => uuid.hyphenated().to_string() == candidate,
        Err(_) => false,
    }
}
