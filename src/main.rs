use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use flair_ladder::{
    ActionOrchestrator, ActionsApiState, DatabasePool, InMemoryLevelStore, LadderConfig,
    RedditClient, SecurityMiddlewareConfig, SecurityState, UserLevelStore, build_app,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Invalid flair ids or a missing subreddit stop the service here, before
    // any moderator action can run
    let config = LadderConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check FLAIR_LADDER_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting flair ladder for r/{}", config.community.name);

    let settings = config.ladder_settings()?;
    info!(
        "Flair ladder has {} level(s), max compare-and-set attempts {}",
        settings.table().level_count(),
        settings.max_cas_attempts()
    );

    let store = create_level_store(&config).await?;

    let reddit = Arc::new(
        RedditClient::new(config.reddit_api_config()).context("Failed to create Reddit client")?,
    );
    info!("Configuration: {}", config.startup_summary());

    let orchestrator = Arc::new(ActionOrchestrator::new(
        settings,
        reddit.clone(),
        reddit,
        store,
    ));

    let security_config = SecurityMiddlewareConfig {
        enable_auth: config.security.enable_auth,
        api_keys: get_api_keys_from_env(),
        rate_limit_per_minute: config.security.rate_limit_per_minute,
        max_request_size: config.security.max_request_size,
        log_requests: config.logging.log_requests,
        sanitize_logs: config.logging.sanitize_logs,
        public_paths: vec!["/health".to_string()],
    };
    let security_state = SecurityState::new(security_config);
    spawn_rate_limit_cleanup(&security_state);

    let app = build_app(ActionsApiState::new(orchestrator), security_state)
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("Flair ladder listening on {}", bind_addr);
    info!(
        "Security middleware: Auth={}, Rate limit={}/min, Max body={}B",
        config.security.enable_auth,
        config.security.rate_limit_per_minute,
        config.security.max_request_size
    );

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &LadderConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

/// PostgreSQL when enabled, otherwise the in-memory store
async fn create_level_store(config: &LadderConfig) -> Result<Arc<dyn UserLevelStore>> {
    if !config.database.postgres_enabled {
        warn!("PostgreSQL disabled, levels are kept in memory and lost on restart");
        return Ok(Arc::new(InMemoryLevelStore::new()));
    }

    let db = DatabasePool::new(
        &config.database.postgres_url,
        config.database.max_connections,
    )
    .await
    .map_err(|e| anyhow::anyhow!(e))?;
    db.init_schema().await.map_err(|e| anyhow::anyhow!(e))?;

    let levels = db.levels();
    match levels.count_users().await {
        Ok(total) => info!("Level store holds {} user record(s)", total),
        Err(e) => warn!("Could not count stored users: {}", e),
    }

    Ok(levels)
}

fn spawn_rate_limit_cleanup(state: &SecurityState) {
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });
}

/// Moderator API keys from FLAIR_LADDER_API_KEY / FLAIR_LADDER_API_KEYS
fn get_api_keys_from_env() -> Vec<String> {
    let mut keys = Vec::new();

    if let Ok(key) = std::env::var("FLAIR_LADDER_API_KEY")
        && !key.is_empty()
    {
        keys.push(key);
    }

    if let Ok(extra_keys) = std::env::var("FLAIR_LADDER_API_KEYS") {
        for key in extra_keys.split(',') {
            let key = key.trim();
            if !key.is_empty() {
                keys.push(key.to_string());
            }
        }
    }

    if keys.is_empty() {
        warn!("No moderator API keys configured - authentication will fail if enabled");
    } else {
        info!("Loaded {} moderator API key(s)", keys.len());
    }

    keys
}
