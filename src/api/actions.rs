//! Moderator action endpoints
//!
//! Endpoints:
//!   POST /promote        -> Promote the author of a post/comment
//!   POST /demote         -> Demote the author of a post/comment
//!   POST /reapply-badge  -> Re-apply the flair for the author's stored level
//!   GET  /last           -> Last promote/demote taken on the author
//!
//! Every response carries a short `notice` meant to be shown to the
//! moderator as-is.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::LadderError;
use crate::leveling::{ActionOrchestrator, ActionOutcome, LastActionReport, ReapplyOutcome};
use crate::reddit::{ContentLocation, ContentRef};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct ActionsApiState {
    pub orchestrator: Arc<ActionOrchestrator>,
}

impl ActionsApiState {
    pub fn new(orchestrator: Arc<ActionOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// The post or comment the moderator invoked the action on
#[derive(Debug, Clone, Deserialize)]
pub struct TargetRequest {
    pub location: ContentLocation,
    pub target_id: String,
}

impl TargetRequest {
    fn into_content_ref(self) -> Result<ContentRef, ApiError> {
        let id = self.target_id.trim().to_string();
        if id.is_empty() {
            return Err(bad_request("target_id is required"));
        }
        Ok(ContentRef {
            location: self.location,
            id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    #[serde(flatten)]
    pub outcome: ActionOutcome,
    pub notice: String,
}

#[derive(Debug, Serialize)]
pub struct LastActionResponse {
    #[serde(flatten)]
    pub report: LastActionReport,
    pub notice: String,
}

#[derive(Debug, Serialize)]
pub struct ReapplyResponse {
    #[serde(flatten)]
    pub outcome: ReapplyOutcome,
    pub notice: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub notice: String,
    /// Whether repeating the same request later may succeed
    pub retryable: bool,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "bad_request".to_string(),
            notice: message.to_string(),
            retryable: false,
        }),
    )
}

/// Map a leveling failure to a status code and moderator notice
fn ladder_error(err: LadderError) -> ApiError {
    let (status, kind) = match &err {
        LadderError::Resolution(_) => (StatusCode::NOT_FOUND, "resolution"),
        LadderError::Configuration(_) => (StatusCode::SERVICE_UNAVAILABLE, "configuration"),
        LadderError::TransientStoreConflict { .. } => (StatusCode::CONFLICT, "conflict"),
        LadderError::Collaborator(_) => (StatusCode::BAD_GATEWAY, "collaborator"),
        LadderError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
        LadderError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    let retryable = err.is_transient();
    if retryable {
        warn!("Moderator action failed, retryable: {}", err);
    } else if status.is_server_error() {
        error!("Moderator action failed: {}", err);
    } else {
        info!("Moderator action rejected: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: kind.to_string(),
            notice: err.notice(),
            retryable,
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /promote
pub async fn promote(
    State(state): State<ActionsApiState>,
    Json(request): Json<TargetRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let target = request.into_content_ref()?;
    let outcome = state
        .orchestrator
        .promote(&target)
        .await
        .map_err(ladder_error)?;
    let notice = outcome.notice();
    Ok(Json(ActionResponse { outcome, notice }))
}

/// POST /demote
pub async fn demote(
    State(state): State<ActionsApiState>,
    Json(request): Json<TargetRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let target = request.into_content_ref()?;
    let outcome = state
        .orchestrator
        .demote(&target)
        .await
        .map_err(ladder_error)?;
    let notice = outcome.notice();
    Ok(Json(ActionResponse { outcome, notice }))
}

/// POST /reapply-badge
pub async fn reapply_badge(
    State(state): State<ActionsApiState>,
    Json(request): Json<TargetRequest>,
) -> Result<Json<ReapplyResponse>, ApiError> {
    let target = request.into_content_ref()?;
    let outcome = state
        .orchestrator
        .reapply_badge(&target)
        .await
        .map_err(ladder_error)?;
    let notice = outcome.notice();
    Ok(Json(ReapplyResponse { outcome, notice }))
}

/// GET /last?location=comment&target_id=abc
pub async fn last_action(
    State(state): State<ActionsApiState>,
    Query(request): Query<TargetRequest>,
) -> Result<Json<LastActionResponse>, ApiError> {
    let target = request.into_content_ref()?;
    let report = state
        .orchestrator
        .query_last_action(&target)
        .await
        .map_err(ladder_error)?;
    let notice = report.notice();
    Ok(Json(LastActionResponse { report, notice }))
}

/// Create the moderator actions router
pub fn create_router(state: ActionsApiState) -> Router {
    Router::new()
        .route("/promote", post(promote))
        .route("/demote", post(demote))
        .route("/reapply-badge", post(reapply_badge))
        .route("/last", get(last_action))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let (status, body) = ladder_error(LadderError::Resolution("gone".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "resolution");
        assert!(!body.retryable);

        let (status, body) = ladder_error(LadderError::TransientStoreConflict {
            username: "alice".to_string(),
            attempts: 3,
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.retryable);

        let (status, _) = ladder_error(LadderError::Configuration("bad".to_string()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_blank_target_rejected() {
        let request = TargetRequest {
            location: ContentLocation::Comment,
            target_id: "   ".to_string(),
        };
        let (status, _) = request.into_content_ref().unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
