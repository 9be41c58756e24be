//! Reddit Collaborators
//!
//! The leveling core only needs two things from the outside world: who wrote
//! a post or comment, and a way to put a flair on that user. Both sit behind
//! traits so the orchestrator can run against the live API or test doubles.

pub mod client;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

pub use client::{RedditApiConfig, RedditClient};

/// Where the moderator action was triggered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentLocation {
    Post,
    Comment,
}

impl ContentLocation {
    /// Reddit fullname prefix for this kind of thing
    pub fn kind_prefix(&self) -> &'static str {
        match self {
            ContentLocation::Post => "t3_",
            ContentLocation::Comment => "t1_",
        }
    }
}

impl fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentLocation::Post => f.write_str("post"),
            ContentLocation::Comment => f.write_str("comment"),
        }
    }
}

/// Reference to the post or comment a moderator acted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub location: ContentLocation,
    pub id: String,
}

impl ContentRef {
    pub fn post(id: impl Into<String>) -> Self {
        Self {
            location: ContentLocation::Post,
            id: id.into(),
        }
    }

    pub fn comment(id: impl Into<String>) -> Self {
        Self {
            location: ContentLocation::Comment,
            id: id.into(),
        }
    }

    /// Fullname (`t3_abc`, `t1_xyz`); accepts ids that are already prefixed
    pub fn fullname(&self) -> String {
        let prefix = self.location.kind_prefix();
        if self.id.starts_with(prefix) {
            self.id.clone()
        } else {
            format!("{}{}", prefix, self.id)
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.location, self.fullname())
    }
}

/// Author of a post or comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAuthor {
    pub author_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Content, author or flair template does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient failure talking to the service
    #[error("unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_author(&self, target: &ContentRef) -> Result<ResolvedAuthor, CollaboratorError>;
}

#[async_trait]
pub trait BadgeAssigner: Send + Sync {
    /// Apply flair template `badge_id` to `username` in `community`.
    /// Returns the flair's display label when it can be looked up.
    async fn assign_badge(
        &self,
        badge_id: &str,
        username: &str,
        community: &str,
    ) -> Result<Option<String>, CollaboratorError>;
}

static EMOJI_SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[A-Za-z0-9_-]+:").expect("static shortcode pattern"));

/// Remove `:emoji_name:` shortcodes from flair text and trim the result
pub fn strip_emoji_shortcodes(text: &str) -> String {
    EMOJI_SHORTCODE.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullname() {
        assert_eq!(ContentRef::post("abc").fullname(), "t3_abc");
        assert_eq!(ContentRef::comment("t1_xyz").fullname(), "t1_xyz");
        assert_eq!(ContentRef::comment("xyz").to_string(), "comment t1_xyz");
    }

    #[test]
    fn test_strip_emoji_shortcodes() {
        assert_eq!(strip_emoji_shortcodes(":star: Gold Member :star:"), "Gold Member");
        assert_eq!(strip_emoji_shortcodes("Level 2 :snoo-wave:"), "Level 2");
        assert_eq!(strip_emoji_shortcodes("Ratio 3:2"), "Ratio 3:2");
        assert_eq!(strip_emoji_shortcodes("a :: b"), "a :: b");
        assert_eq!(strip_emoji_shortcodes(":only:"), "");
        assert_eq!(strip_emoji_shortcodes("Mod:shield:Team"), "ModTeam");
    }
}
