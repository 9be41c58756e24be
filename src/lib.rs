//! Flair Ladder
//!
//! Moderator-driven user leveling for a subreddit. Moderators promote or
//! demote the author of a post or comment; the author's level is stored with
//! an audit record of the last action, and the flair for the new level is
//! applied to the user.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Leveling error kinds and moderator notices
//! ├── leveling/      - Leveling & audit state machine
//! │   ├── engine.rs       - Pure transition rules (±1, boundaries)
//! │   ├── table.rs        - Flair level table & id validation
//! │   ├── record.rs       - Per-user level record
//! │   └── orchestrator.rs - Promote / demote / query orchestration
//! ├── database/      - User level store
//! │   ├── memory.rs  - In-memory compare-and-set store
//! │   ├── levels.rs  - PostgreSQL compare-and-set store
//! │   └── pool.rs    - Connection pool & schema setup
//! ├── reddit/        - Identity & flair collaborators
//! │   └── client.rs  - Reddit OAuth REST client
//! └── api/           - HTTP API endpoints
//!     ├── actions.rs    - Moderator actions
//!     └── middleware.rs - Auth, rate limiting, headers, logging
//! ```

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod leveling;
pub mod reddit;

// Re-export main types for convenience
pub use config::LadderConfig;
pub use database::{CasOutcome, DatabasePool, InMemoryLevelStore, LevelRepository, UserLevelStore};
pub use error::{LadderError, LadderResult};
pub use leveling::{
    ActionOrchestrator, ActionOutcome, FlairLevelTable, LadderSettings, LastActionReport,
    LevelAction, ReapplyOutcome, Transition, UserLevelRecord, compute_transition,
};
pub use reddit::{
    BadgeAssigner, CollaboratorError, ContentLocation, ContentRef, IdentityResolver,
    RedditApiConfig, RedditClient, ResolvedAuthor,
};

// Re-export API types
pub use api::{ActionsApiState, SecurityMiddlewareConfig, SecurityState, build_app};
