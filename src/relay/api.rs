use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::error;

use super::gitlab::{self, ProjectId, StateEvent};
use super::webhook;
use crate::config::RelayConfig;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub config: RelayConfig,
    pub events_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StateChangeRequest {
    #[serde(rename = "projectId")]
    pub project_id: ProjectId,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/webhooks/", post(webhook::receive))
        .route("/webhooks/projectId", get(project_id))
        .route("/webhooks/{iid}/close", put(close_issue))
        .route("/webhooks/{iid}/reopen", put(reopen_issue))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// `GET /webhooks/projectId`: the bare project id is the only piece of
/// configuration ever exposed to viewers.
async fn project_id(State(state): State<SharedState>) -> impl IntoResponse {
    Json(serde_json::json!({ "projectId": state.config.project_id }))
}

/// `PUT /webhooks/{iid}/close`
async fn close_issue(
    State(state): State<SharedState>,
    Path(iid): Path<u64>,
    Json(req): Json<StateChangeRequest>,
) -> Result<StatusCode, ApiError> {
    change_state(&state, iid, req, StateEvent::Close).await
}

/// `PUT /webhooks/{iid}/reopen`
async fn reopen_issue(
    State(state): State<SharedState>,
    Path(iid): Path<u64>,
    Json(req): Json<StateChangeRequest>,
) -> Result<StatusCode, ApiError> {
    change_state(&state, iid, req, StateEvent::Reopen).await
}

async fn change_state(
    state: &SharedState,
    iid: u64,
    req: StateChangeRequest,
    event: StateEvent,
) -> Result<StatusCode, ApiError> {
    let project_id = req.project_id.to_string();
    gitlab::set_issue_state(&state.config, &project_id, iid, event)
        .await
        .map_err(|err| {
            error!(iid, state_event = event.as_str(), error = %err, "upstream state change failed");
            ApiError::Upstream(err.to_string())
        })?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn state_change_request_accepts_string_project_id() {
        let req: StateChangeRequest = serde_json::from_str(r#"{"projectId": "9"}"#).unwrap();
        assert_eq!(req.project_id.to_string(), "9");
    }

    #[test]
    fn state_change_request_accepts_numeric_project_id() {
        let req: StateChangeRequest = serde_json::from_str(r#"{"projectId": 9}"#).unwrap();
        assert_eq!(req.project_id.to_string(), "9");
    }

    #[tokio::test]
    async fn api_error_renders_500_with_error_body() {
        let resp = ApiError::Upstream("GitLab returned 403".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["error"], "GitLab returned 403");
    }
}
