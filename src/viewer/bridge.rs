//! Client side of the action path: done-toggles become state-change
//! requests against the relay's HTTP surface.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::relay::gitlab::ProjectId;

/// Issues close/reopen calls for one viewer against a running relay.
pub struct ActionBridge {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ProjectIdResponse {
    #[serde(rename = "projectId")]
    project_id: ProjectId,
}

impl ActionBridge {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve the relay's project id. Called once per toggle; the value
    /// is deliberately not cached.
    pub async fn project_id(&self) -> Result<String> {
        let url = format!("{}/webhooks/projectId", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("failed to request project id")?
            .error_for_status()
            .context("project id request rejected")?
            .json::<ProjectIdResponse>()
            .await
            .context("failed to parse project id response")?;
        Ok(resp.project_id.to_string())
    }

    /// Forward one user toggle: checked means close, unchecked means
    /// reopen. Close failures propagate to the caller; reopen failures are
    /// logged and swallowed.
    pub async fn toggle(&self, iid: u64, done: bool) -> Result<()> {
        let project_id = self.project_id().await?;
        if done {
            self.close(iid, &project_id).await
        } else {
            if let Err(error) = self.reopen(iid, &project_id).await {
                warn!(iid, %error, "reopen request failed");
            }
            Ok(())
        }
    }

    pub async fn close(&self, iid: u64, project_id: &str) -> Result<()> {
        self.put_state(iid, "close", project_id).await
    }

    pub async fn reopen(&self, iid: u64, project_id: &str) -> Result<()> {
        self.put_state(iid, "reopen", project_id).await
    }

    async fn put_state(&self, iid: u64, verb: &str, project_id: &str) -> Result<()> {
        let url = format!("{}/webhooks/{}/{}", self.base_url, iid, verb);
        let resp = self
            .http
            .put(&url)
            .json(&serde_json::json!({ "projectId": project_id }))
            .send()
            .await
            .with_context(|| format!("failed to send {verb} request for issue {iid}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{verb} request for issue {iid} failed with {status}: {body}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
        routing::{get, put},
    };
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockRelay {
        puts: Arc<Mutex<Vec<(String, String, String)>>>,
        fail_puts: bool,
    }

    async fn spawn_mock(mock: MockRelay) -> String {
        let app = Router::new()
            .route(
                "/webhooks/projectId",
                get(|| async { Json(serde_json::json!({"projectId": "9"})) }),
            )
            .route(
                "/webhooks/{iid}/{verb}",
                put(
                    |State(mock): State<MockRelay>,
                     Path((iid, verb)): Path<(String, String)>,
                     Json(body): Json<serde_json::Value>| async move {
                        mock.puts.lock().unwrap().push((
                            iid,
                            verb,
                            body["projectId"].as_str().unwrap_or_default().to_string(),
                        ));
                        if mock.fail_puts {
                            (StatusCode::BAD_GATEWAY, "upstream said no").into_response()
                        } else {
                            StatusCode::OK.into_response()
                        }
                    },
                ),
            )
            .with_state(mock);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn toggle_checked_sends_exactly_one_close_request() {
        let mock = MockRelay::default();
        let base = spawn_mock(mock.clone()).await;

        ActionBridge::new(&base).toggle(5, true).await.unwrap();

        let puts = mock.puts.lock().unwrap();
        assert_eq!(
            puts.as_slice(),
            &[("5".to_string(), "close".to_string(), "9".to_string())]
        );
    }

    #[tokio::test]
    async fn toggle_unchecked_sends_a_reopen_request() {
        let mock = MockRelay::default();
        let base = spawn_mock(mock.clone()).await;

        ActionBridge::new(&base).toggle(5, false).await.unwrap();

        let puts = mock.puts.lock().unwrap();
        assert_eq!(
            puts.as_slice(),
            &[("5".to_string(), "reopen".to_string(), "9".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_close_propagates_to_the_caller() {
        let mock = MockRelay {
            fail_puts: true,
            ..MockRelay::default()
        };
        let base = spawn_mock(mock.clone()).await;

        let err = ActionBridge::new(&base).toggle(5, true).await.unwrap_err();
        assert!(err.to_string().contains("close"));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn failed_reopen_is_swallowed() {
        let mock = MockRelay {
            fail_puts: true,
            ..MockRelay::default()
        };
        let base = spawn_mock(mock.clone()).await;

        ActionBridge::new(&base).toggle(5, false).await.unwrap();
        assert_eq!(mock.puts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_relay_fails_the_project_id_resolve() {
        let bridge = ActionBridge::new("http://127.0.0.1:1");
        let err = bridge.toggle(5, true).await.unwrap_err();
        assert!(err.to_string().contains("project id"));
    }

    #[tokio::test]
    async fn project_id_tolerates_numeric_response() {
        let app = Router::new().route(
            "/webhooks/projectId",
            get(|| async { Json(serde_json::json!({"projectId": 9})) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let bridge = ActionBridge::new(&format!("http://{addr}"));
        assert_eq!(bridge.project_id().await.unwrap(), "9");
    }
}
