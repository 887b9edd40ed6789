use std::fmt;

use anyhow::{Context, Result};

/// Default upstream API base; override with `GITLAB_API_BASE`.
const DEFAULT_API_BASE: &str = "https://gitlab.lnu.se/api/v4";

/// Process-wide relay configuration.
///
/// Read once at startup and injected into the webhook receiver and the
/// upstream client; business logic never reaches into the environment.
/// Both secrets are redacted from the `Debug` output so they cannot leak
/// through logging.
#[derive(Clone)]
pub struct RelayConfig {
    /// Shared secret expected in the `x-gitlab-token` webhook header.
    pub webhook_secret: String,
    /// Private token for authenticated GitLab API calls.
    pub gitlab_token: String,
    /// The GitLab project whose issues are relayed.
    pub project_id: String,
    /// Base URL of the GitLab REST API.
    pub api_base: String,
}

impl RelayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| -> Result<String> {
            get(key)
                .filter(|value| !value.is_empty())
                .with_context(|| format!("missing required environment variable {key}"))
        };

        Ok(Self {
            webhook_secret: require("WEBHOOK_SECRET")?,
            gitlab_token: require("GITLAB_TOKEN")?,
            project_id: require("PROJECT_ID")?,
            api_base: get("GITLAB_API_BASE")
                .filter(|value| !value.is_empty())
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("webhook_secret", &"<redacted>")
            .field("gitlab_token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}
