//! HTTP API for moderators
//!
//! - Moderator actions (promote, demote, reapply flair, last action)
//! - Security middleware (auth, rate limiting, headers)

pub mod actions;
pub mod middleware;

pub use actions::{ActionsApiState, create_router as create_actions_router};
pub use middleware::{
    RateLimiter, SecurityMiddlewareConfig, SecurityState, auth_middleware, body_size_middleware,
    logging_middleware, rate_limit_middleware, security_headers_middleware,
};

use axum::middleware as axum_middleware;
use axum::{Router, routing::get};

/// Full application router: `/actions/*` behind the security layers plus a
/// public `/health`
///
/// Outermost first: headers, logging, rate limiting, auth, body size.
/// Requests with a rejected key still count against the rate limit.
pub fn build_app(actions: ActionsApiState, security: SecurityState) -> Router {
    Router::new()
        .nest("/actions", create_actions_router(actions))
        .route("/health", get(|| async { "OK" }))
        .layer(axum_middleware::from_fn_with_state(
            security.clone(),
            body_size_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security,
            logging_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
}
