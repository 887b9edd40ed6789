//! Webhook receiver: validate, acknowledge, normalize, publish.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::api::SharedState;
use super::ws;
use crate::event::{IssueEvent, WebhookPayload};

/// Header carrying the shared webhook secret.
pub const TOKEN_HEADER: &str = "x-gitlab-token";

/// `POST /webhooks/`: entry point for upstream pushes.
///
/// The secret check is the only thing that can fail the request. Once it
/// passes, the 200 goes on the wire immediately; normalization and fan-out
/// run on a detached task so the upstream caller never waits on delivery
/// and later failures cannot alter the already-sent response.
pub(crate) async fn receive(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let presented = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(state.config.webhook_secret.as_str()) {
        info!("webhook rejected: invalid token");
        return StatusCode::UNAUTHORIZED;
    }

    tokio::spawn(async move {
        if let Err(error) = process(&state.events_tx, &body) {
            error!(%error, "webhook processing failed after acknowledgment");
        }
    });
    StatusCode::OK
}

/// Normalize an accepted webhook body and publish it to all viewers.
///
/// Filtered categories and unmapped actions are clean no-ops; anything
/// else that goes wrong is returned for logging only.
fn process(events_tx: &broadcast::Sender<String>, body: &[u8]) -> anyhow::Result<()> {
    let raw: serde_json::Value = serde_json::from_slice(body)?;

    // Only issue events are relayed; other categories were still acknowledged.
    if raw.get("event_type").and_then(|v| v.as_str()) != Some("issue") {
        debug!(event_type = ?raw.get("event_type"), "ignoring non-issue webhook");
        return Ok(());
    }

    let payload: WebhookPayload = serde_json::from_value(raw)?;
    match IssueEvent::from_webhook(payload) {
        Some(event) => {
            debug!(tag = event.tag(), "publishing issue event");
            ws::broadcast_event(events_tx, &event);
        }
        None => debug!("ignoring unmapped issue action"),
    }
    Ok(())
}
