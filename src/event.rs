//! Issue event model shared by the relay and its viewers.
//!
//! Webhook payloads are parsed into subset structs that keep every unknown
//! field in a flattened map, so the envelope that reaches viewers carries
//! the original upstream payload rather than a lossy projection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::relay::gitlab::GitLabIssue;

/// Upstream issue actions the relay understands, plus an explicit bucket
/// for everything else so matches over the mapping stay exhaustive when
/// the upstream action set grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    Open,
    Reopen,
    Close,
    Update,
    /// Anything unmapped; never broadcast.
    Ignored,
}

impl IssueAction {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "open" => Self::Open,
            "reopen" => Self::Reopen,
            "close" => Self::Close,
            "update" => Self::Update,
            _ => Self::Ignored,
        }
    }
}

/// `object_attributes` subset of a GitLab issue webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectAttributes {
    /// Internal issue number; the sole reconciliation key.
    pub iid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectAttributes {
    pub fn action_kind(&self) -> IssueAction {
        self.action
            .as_deref()
            .map_or(IssueAction::Ignored, IssueAction::parse)
    }
}

/// The acting or authoring user; the avatar is the only display attribute
/// viewers need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Issue webhook payload (subset of fields we care about; the rest rides
/// along in `extra`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    pub object_attributes: ObjectAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tagged envelope delivered to every connected viewer.
///
/// Serializes as `{"type": "<tag>", "data": <payload>}`; constructed once
/// per accepted webhook, consumed once per viewer, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IssueEvent {
    /// One-time full-list snapshot, sent to a single viewer on connect.
    #[serde(rename = "issues")]
    Snapshot(Vec<GitLabIssue>),
    #[serde(rename = "issues/open")]
    Opened(WebhookPayload),
    #[serde(rename = "issues/reopen")]
    Reopened(WebhookPayload),
    #[serde(rename = "issues/close")]
    Closed(WebhookPayload),
    #[serde(rename = "issues/update")]
    Updated(WebhookPayload),
}

impl IssueEvent {
    /// Map an accepted webhook payload to its broadcast event. Returns
    /// `None` for actions the relay does not recognize; those are dropped
    /// without error.
    pub fn from_webhook(payload: WebhookPayload) -> Option<Self> {
        match payload.object_attributes.action_kind() {
            IssueAction::Open => Some(Self::Opened(payload)),
            IssueAction::Reopen => Some(Self::Reopened(payload)),
            IssueAction::Close => Some(Self::Closed(payload)),
            IssueAction::Update => Some(Self::Updated(payload)),
            IssueAction::Ignored => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "issues",
            Self::Opened(_) => "issues/open",
            Self::Reopened(_) => "issues/reopen",
            Self::Closed(_) => "issues/close",
            Self::Updated(_) => "issues/update",
        }
    }
}
