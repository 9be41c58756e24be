use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use tracing::{info, warn};

use crate::leveling::{DEFAULT_MAX_CAS_ATTEMPTS, FlairLevelTable, LadderSettings};
use crate::reddit::RedditApiConfig;

/// Configuration for the flair ladder service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Community (subreddit) and flair ladder
    pub community: CommunityConfig,
    /// Leveling behaviour
    pub leveling: LevelingConfig,
    /// Reddit API access
    pub reddit: RedditConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require HTTPS for outbound API calls
    pub require_https: bool,
    /// Require a moderator API key on action endpoints
    pub enable_auth: bool,
    /// Rate limit per minute per client
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityConfig {
    /// Subreddit the flairs belong to
    pub name: String,
    /// Flair template ids, index = level
    pub flair_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelingConfig {
    /// Compare-and-set attempts before reporting a conflict
    pub max_cas_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    /// OAuth API base URL
    pub api_base: String,
    /// Bearer token, loaded from the environment only
    #[serde(skip_serializing, default)]
    pub access_token: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, uses in-memory fallback)
    pub postgres_enabled: bool,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Mask API keys and tokens in logs
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
}

impl Default for LadderConfig {
    fn default() -> Self {
        let reddit = RedditApiConfig::default();
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8787,
            },
            security: SecurityConfig {
                require_https: true,
                enable_auth: true,
                rate_limit_per_minute: 120,
                max_request_size: 16 * 1024,
            },
            community: CommunityConfig {
                name: String::new(), // MUST be configured
                flair_ids: Vec::new(), // MUST be configured
            },
            leveling: LevelingConfig {
                max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
            },
            reddit: RedditConfig {
                api_base: reddit.api_base,
                access_token: String::new(),
                user_agent: reddit.user_agent,
                timeout_secs: reddit.timeout_secs,
            },
            database: DatabaseConfig {
                postgres_url: "postgresql://localhost:5432/flair_ladder".to_string(),
                postgres_enabled: false,
                max_connections: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false,
            },
        }
    }
}

impl LadderConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("FLAIR_LADDER_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = env::var("FLAIR_LADDER_PORT") {
            config.server.port = port.parse().context("Invalid FLAIR_LADDER_PORT value")?;
        }

        if let Ok(require_https) = env::var("FLAIR_LADDER_REQUIRE_HTTPS") {
            config.security.require_https = require_https
                .parse()
                .context("Invalid FLAIR_LADDER_REQUIRE_HTTPS value")?;
        }

        if let Ok(enable_auth) = env::var("FLAIR_LADDER_ENABLE_AUTH") {
            config.security.enable_auth = enable_auth
                .parse()
                .context("Invalid FLAIR_LADDER_ENABLE_AUTH value")?;
        }

        if let Ok(rate_limit) = env::var("FLAIR_LADDER_RATE_LIMIT_PER_MINUTE") {
            config.security.rate_limit_per_minute = rate_limit
                .parse()
                .context("Invalid FLAIR_LADDER_RATE_LIMIT_PER_MINUTE value")?;
        }

        // Community settings - required
        config.community.name = env::var("FLAIR_LADDER_SUBREDDIT")
            .context("FLAIR_LADDER_SUBREDDIT environment variable is required")?
            .trim()
            .trim_start_matches("r/")
            .to_string();
        config.community.flair_ids = Self::load_flair_ids()?;

        if let Ok(attempts) = env::var("FLAIR_LADDER_MAX_CAS_ATTEMPTS") {
            config.leveling.max_cas_attempts = attempts
                .parse()
                .context("Invalid FLAIR_LADDER_MAX_CAS_ATTEMPTS value")?;
        }

        // Reddit API
        if let Ok(api_base) = env::var("FLAIR_LADDER_REDDIT_API_BASE") {
            config.reddit.api_base = api_base;
        }

        config.reddit.access_token = env::var("FLAIR_LADDER_REDDIT_TOKEN")
            .context("FLAIR_LADDER_REDDIT_TOKEN environment variable is required")?;

        if let Ok(user_agent) = env::var("FLAIR_LADDER_REDDIT_USER_AGENT") {
            config.reddit.user_agent = user_agent;
        }

        if let Ok(timeout) = env::var("FLAIR_LADDER_REDDIT_TIMEOUT_SECS") {
            config.reddit.timeout_secs = timeout
                .parse()
                .context("Invalid FLAIR_LADDER_REDDIT_TIMEOUT_SECS value")?;
        }

        // Database
        if let Ok(url) = env::var("FLAIR_LADDER_POSTGRES_URL") {
            config.database.postgres_url = url;
        }

        if let Ok(enabled) = env::var("FLAIR_LADDER_POSTGRES_ENABLED") {
            config.database.postgres_enabled = enabled
                .parse()
                .context("Invalid FLAIR_LADDER_POSTGRES_ENABLED value")?;
        }

        if let Ok(max) = env::var("FLAIR_LADDER_POSTGRES_MAX_CONNECTIONS") {
            config.database.max_connections = max
                .parse()
                .context("Invalid FLAIR_LADDER_POSTGRES_MAX_CONNECTIONS value")?;
        }

        // Logging
        if let Ok(log_level) = env::var("FLAIR_LADDER_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Ok(sanitize_logs) = env::var("FLAIR_LADDER_SANITIZE_LOGS") {
            config.logging.sanitize_logs = sanitize_logs
                .parse()
                .context("Invalid FLAIR_LADDER_SANITIZE_LOGS value")?;
        }

        if let Ok(log_requests) = env::var("FLAIR_LADDER_LOG_REQUESTS") {
            config.logging.log_requests = log_requests
                .parse()
                .context("Invalid FLAIR_LADDER_LOG_REQUESTS value")?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Flair ids come from FLAIR_LADDER_FLAIR_IDS (one per line, or
    /// comma-separated) or from the file named by FLAIR_LADDER_FLAIR_IDS_FILE
    fn load_flair_ids() -> Result<Vec<String>> {
        let raw = if let Ok(inline) = env::var("FLAIR_LADDER_FLAIR_IDS") {
            inline
        } else if let Ok(path) = env::var("FLAIR_LADDER_FLAIR_IDS_FILE") {
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read flair id file {}", path))?
        } else {
            return Err(anyhow::anyhow!(
                "No flair ladder configured. Set FLAIR_LADDER_FLAIR_IDS (one flair template id \
                 per line) or FLAIR_LADDER_FLAIR_IDS_FILE."
            ));
        };

        let table = FlairLevelTable::parse(&raw)?;
        info!("Loaded flair ladder with {} level(s)", table.level_count());
        Ok(table.flair_ids().to_vec())
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        // Flair table and community are checked once here, before any action runs
        self.ladder_settings()?;

        if self.security.require_https && !self.reddit.api_base.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "HTTPS is required but Reddit API base is not HTTPS: {}",
                self.reddit.api_base
            ));
        }

        if self.reddit.access_token.is_empty() {
            return Err(anyhow::anyhow!("Reddit access token is required"));
        }

        if self.reddit.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Reddit timeout must be non-zero"));
        }

        if self.database.postgres_enabled && self.database.postgres_url.is_empty() {
            return Err(anyhow::anyhow!(
                "PostgreSQL is enabled but no connection string is set"
            ));
        }

        if !self.security.enable_auth {
            warn!("Moderator API key authentication is disabled");
        }

        Ok(())
    }

    /// Validated community settings for the orchestrator
    pub fn ladder_settings(&self) -> Result<LadderSettings> {
        let table = FlairLevelTable::new(self.community.flair_ids.clone())?;
        let settings =
            LadderSettings::new(&self.community.name, table, self.leveling.max_cas_attempts)?;
        Ok(settings)
    }

    /// One-line description for startup logs. Secrets are reported only as
    /// present or missing.
    pub fn startup_summary(&self) -> String {
        format!(
            "r/{} via {} (token {}), {} flair level(s), postgres {}",
            self.community.name,
            self.reddit.api_base,
            if self.reddit.access_token.is_empty() {
                "missing"
            } else {
                "present"
            },
            self.community.flair_ids.len(),
            if self.database.postgres_enabled {
                "enabled"
            } else {
                "disabled"
            }
        )
    }

    pub fn reddit_api_config(&self) -> RedditApiConfig {
        RedditApiConfig {
            api_base: self.reddit.api_base.clone(),
            access_token: self.reddit.access_token.clone(),
            user_agent: self.reddit.user_agent.clone(),
            timeout_secs: self.reddit.timeout_secs,
            require_https: self.security.require_https,
        }
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> LadderConfig {
        let mut config = LadderConfig::default();
        config.community.name = "testsub".to_string();
        config.community.flair_ids = vec![
            "0b6a3f0e-9d1c-11ee-8c90-0242ac120002".to_string(),
            "1c7b4e1f-9d1c-11ee-8c90-0242ac120002".to_string(),
        ];
        config.reddit.access_token = "token-abcdefghijklmnop".to_string();
        config
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("short"), "*****");
        assert_eq!(sanitize_for_logging("token-abcdefghijklmnop"), "toke***mnop");
    }

    #[test]
    fn test_startup_summary_hides_token() {
        let mut config = valid_config();
        let summary = config.startup_summary();
        assert!(summary.contains("token present"));
        assert!(!summary.contains(&config.reddit.access_token));
        assert!(!summary.contains("mnop"));

        config.reddit.access_token.clear();
        assert!(config.startup_summary().contains("token missing"));
    }

    #[test]
    fn test_config_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());

        let settings = config.ladder_settings().unwrap();
        assert_eq!(settings.community(), "testsub");
        assert_eq!(settings.table().max_level(), 1);
    }

    #[test]
    fn test_malformed_flair_id_blocks_startup() {
        let mut config = valid_config();
        config.community.flair_ids.push("gold-flair".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_community_blocks_startup() {
        let mut config = valid_config();
        config.community.name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_https_required_for_reddit_api() {
        let mut config = valid_config();
        config.reddit.api_base = "http://oauth.reddit.com".to_string();
        assert!(config.validate().is_err());

        config.security.require_https = false;
        assert!(config.validate().is_ok());
    }
}
