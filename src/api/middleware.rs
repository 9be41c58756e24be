//! Request guards for the moderator API
//!
//! Provides:
//! - Moderator API key authentication
//! - Per-client rate limiting
//! - Request body size limits
//! - Security headers
//! - Request logging with sanitization

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::sanitize_for_logging;

#[derive(Debug, Clone)]
pub struct SecurityMiddlewareConfig {
    /// Require a moderator API key
    pub enable_auth: bool,
    /// Accepted moderator API keys
    pub api_keys: Vec<String>,
    /// Requests per minute per client
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    pub log_requests: bool,
    pub sanitize_logs: bool,
    /// Path prefixes reachable without a key
    pub public_paths: Vec<String>,
}

impl Default for SecurityMiddlewareConfig {
    fn default() -> Self {
        Self {
            enable_auth: true,
            api_keys: Vec::new(),
            rate_limit_per_minute: 120,
            max_request_size: 16 * 1024,
            log_requests: false,
            sanitize_logs: true,
            public_paths: vec!["/health".to_string()],
        }
    }
}

/// Fixed-window request counter keyed by client
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, (u32, Instant)>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            windows: DashMap::new(),
            limit: requests_per_minute,
            window: Duration::from_secs(60),
        }
    }

    /// Count a request for `client`; false once the window is exhausted
    pub fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(client.to_string()).or_insert((0, now));
        let (count, started) = entry.value_mut();

        if now.duration_since(*started) >= self.window {
            *count = 0;
            *started = now;
        }

        if *count >= self.limit {
            return false;
        }
        *count += 1;
        true
    }

    /// Drop windows that have long expired
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, (_, started)| now.duration_since(*started) < self.window * 2);
    }
}

#[derive(Clone)]
pub struct SecurityState {
    pub config: SecurityMiddlewareConfig,
    pub rate_limiter: Arc<RateLimiter>,
}

impl SecurityState {
    pub fn new(config: SecurityMiddlewareConfig) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));
        Self {
            config,
            rate_limiter,
        }
    }
}

fn is_public_path(path: &str, public_paths: &[String]) -> bool {
    public_paths.iter().any(|p| path.starts_with(p))
}

/// API key from `x-api-key` or `Authorization: Bearer <key>`
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .and_then(|v| v.to_str().ok())
        .map(|s| {
            s.trim_start_matches("Bearer ")
                .trim_start_matches("bearer ")
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
}

/// Client identity for rate limiting: the API key if it is an accepted
/// one, else the first forwarded address. Guessed keys share the address
/// bucket so rotating them does not reset the window.
fn client_key(headers: &HeaderMap, accepted_keys: &[String]) -> String {
    if let Some(key) = extract_api_key(headers)
        && accepted_keys.contains(&key)
    {
        return format!("key:{}", key);
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| format!("ip:{}", ip.trim()))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Moderator authentication
pub async fn auth_middleware(
    State(state): State<SecurityState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path().to_string();

    if !state.config.enable_auth || is_public_path(&path, &state.config.public_paths) {
        return Ok(next.run(request).await);
    }

    match extract_api_key(&headers) {
        Some(key) if state.config.api_keys.contains(&key) => {
            debug!("Moderator key accepted for {}", path);
            Ok(next.run(request).await)
        }
        Some(key) => {
            let shown = if state.config.sanitize_logs {
                sanitize_for_logging(&key)
            } else {
                key
            };
            warn!("Rejected moderator key {} for {}", shown, path);
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!("Missing moderator key for {}", path);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn rate_limit_middleware(
    State(state): State<SecurityState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path(), &state.config.public_paths) {
        return next.run(request).await;
    }

    let client = client_key(&headers, &state.config.api_keys);
    if !state.rate_limiter.allow(&client) {
        warn!("Rate limit exceeded on {}", request.uri().path());
        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
        response
            .headers_mut()
            .insert("Retry-After", HeaderValue::from_static("60"));
        return response;
    }

    next.run(request).await
}

pub async fn body_size_middleware(
    State(state): State<SecurityState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let declared = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if let Some(length) = declared
        && length > state.config.max_request_size
    {
        warn!(
            "Request body too large: {} bytes (max: {})",
            length, state.config.max_request_size
        );
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    Ok(next.run(request).await)
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    response
}

pub async fn logging_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.log_requests {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() || status.is_client_error() {
        warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request failed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.allow("key:a"));
        assert!(limiter.allow("key:a"));
        assert!(!limiter.allow("key:a"));
        assert!(limiter.allow("key:b"));
    }

    #[test]
    fn test_extract_api_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer mod-key-1"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("mod-key-1"));

        headers.insert("x-api-key", HeaderValue::from_static("mod-key-2"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("mod-key-2"));
    }

    #[test]
    fn test_client_key_prefers_api_key() {
        let mut headers = HeaderMap::new();
        let accepted = vec!["k".to_string()];
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        assert_eq!(client_key(&headers, &accepted), "ip:10.0.0.1");

        headers.insert("x-api-key", HeaderValue::from_static("k"));
        assert_eq!(client_key(&headers, &accepted), "key:k");
    }

    #[test]
    fn test_client_key_ignores_unknown_keys() {
        let mut headers = HeaderMap::new();
        let accepted = vec!["k".to_string()];
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.9"));
        headers.insert("x-api-key", HeaderValue::from_static("guess-1"));
        assert_eq!(client_key(&headers, &accepted), "ip:10.0.0.9");

        headers.insert("x-api-key", HeaderValue::from_static("guess-2"));
        assert_eq!(client_key(&headers, &accepted), "ip:10.0.0.9");
    }

    #[test]
    fn test_is_public_path() {
        let public = vec!["/health".to_string()];
        assert!(is_public_path("/health", &public));
        assert!(!is_public_path("/actions/promote", &public));
    }
}
