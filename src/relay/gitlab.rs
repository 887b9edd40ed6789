//! Authenticated client for the upstream GitLab REST API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RelayConfig;
use crate::errors::UpstreamError;
use crate::event::UserRef;

/// A GitLab issue (subset of fields the board needs; everything else rides
/// along untouched so snapshots relay the full upstream item).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabIssue {
    pub iid: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<UserRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GitLabIssue {
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

/// Project identifier as it appears on the wire: GitLab uses numbers, the
/// relay's own configuration keeps it as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// State transition requested against an upstream issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Close,
    Reopen,
}

impl StateEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Reopen => "reopen",
        }
    }
}

/// Fetch the full issue list for the configured project.
pub async fn list_issues(config: &RelayConfig) -> Result<Vec<GitLabIssue>, UpstreamError> {
    let client = reqwest::Client::new();
    let url = format!(
        "{}/projects/{}/issues",
        config.api_base, config.project_id
    );
    let resp = client
        .get(&url)
        .header("PRIVATE-TOKEN", &config.gitlab_token)
        .send()
        .await?;
    let resp = check_status(resp).await?;
    Ok(resp.json().await?)
}

/// Ask GitLab to close or reopen one issue.
pub async fn set_issue_state(
    config: &RelayConfig,
    project_id: &str,
    iid: u64,
    state: StateEvent,
) -> Result<(), UpstreamError> {
    let client = reqwest::Client::new();
    let url = format!(
        "{}/projects/{}/issues/{}",
        config.api_base, project_id, iid
    );
    let resp = client
        .put(&url)
        .header("PRIVATE-TOKEN", &config.gitlab_token)
        .json(&serde_json::json!({ "state_event": state.as_str() }))
        .send()
        .await?;
    check_status(resp).await?;
    Ok(())
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(UpstreamError::Status { status, body })
}
