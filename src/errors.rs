//! Typed errors for calls against the upstream platform.

use thiserror::Error;

/// Errors from the GitLab API client.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// GitLab answered with a non-2xx status; the body is kept for
    /// diagnostics.
    #[error("GitLab returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("request to GitLab failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_carries_status_and_body() {
        let err = UpstreamError::Status {
            status: reqwest::StatusCode::FORBIDDEN,
            body: "insufficient scope".to_string(),
        };
        match &err {
            UpstreamError::Status { status, body } => {
                assert_eq!(*status, reqwest::StatusCode::FORBIDDEN);
                assert_eq!(body, "insufficient scope");
            }
            _ => panic!("expected Status variant"),
        }
        let rendered = err.to_string();
        assert!(rendered.contains("403"));
        assert!(rendered.contains("insufficient scope"));
    }

    #[test]
    fn upstream_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        let err = UpstreamError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        };
        assert_std_error(&err);
    }
}
