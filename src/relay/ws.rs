//! Viewer WebSocket endpoint: one-time snapshot plus broadcast forwarding.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::api::SharedState;
use super::gitlab;
use crate::event::IssueEvent;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection
/// dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// `GET /ws`: upgrade a viewer connection.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, receiver) = socket.split();

    // Subscribe before the snapshot fetch so nothing published meanwhile is
    // missed. Ordering between the snapshot and live events is unspecified;
    // the viewer's merge-by-key handling keeps that race harmless.
    let rx = state.events_tx.subscribe();

    match gitlab::list_issues(&state.config).await {
        Ok(issues) => {
            debug!(count = issues.len(), "sending issue snapshot");
            match serde_json::to_string(&IssueEvent::Snapshot(issues)) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        return;
                    }
                }
                Err(error) => error!(%error, "failed to serialize issue snapshot"),
            }
        }
        // The viewer starts from an empty list; live events still flow.
        Err(error) => warn!(%error, "issue snapshot fetch failed"),
    }

    run_socket_loop(sender, receiver, rx).await;
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Combines broadcast forwarding, client frame handling, and periodic
/// ping/pong health checking into a single select loop. If no Pong arrives
/// within [`PONG_TIMEOUT`] after a Ping was sent, the connection is
/// considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately; consume it so the first real
    // ping fires after PING_INTERVAL has elapsed.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "viewer lagged behind the broadcast");
                        continue;
                    }
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Viewers send no protocol events over the socket.
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sender.send(Message::Close(None)).await;
}

/// Serialize and broadcast an event to every connected viewer. Publishing
/// with no viewers connected is not an error.
pub fn broadcast_event(tx: &broadcast::Sender<String>, event: &IssueEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(error) => error!(%error, "failed to serialize issue event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ObjectAttributes, WebhookPayload};
    use serde_json::Map;

    fn sample_event() -> IssueEvent {
        IssueEvent::Opened(WebhookPayload {
            event_type: Some("issue".to_string()),
            object_attributes: ObjectAttributes {
                iid: 1,
                action: Some("open".to_string()),
                title: Some("T".to_string()),
                description: Some("D".to_string()),
                extra: Map::new(),
            },
            user: None,
            extra: Map::new(),
        })
    }

    #[tokio::test]
    async fn broadcast_delivers_to_all_subscribers() {
        let (tx, _) = broadcast::channel::<String>(16);
        let mut rx1 = tx.subscribe();
        let mut rx2 = tx.subscribe();

        broadcast_event(&tx, &sample_event());

        let received1 = rx1.recv().await.unwrap();
        let received2 = rx2.recv().await.unwrap();
        assert!(received1.contains("issues/open"));
        assert_eq!(received1, received2);
    }

    #[tokio::test]
    async fn broadcast_without_receivers_does_not_panic() {
        let (tx, _) = broadcast::channel::<String>(16);
        broadcast_event(&tx, &sample_event());
    }

    #[test]
    fn keepalive_constants_are_consistent() {
        // The pong deadline must exceed the ping period so a fresh
        // connection is never declared dead on its first ping.
        assert!(PONG_TIMEOUT > PING_INTERVAL);
    }
}
