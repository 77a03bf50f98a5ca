//! Errors surfaced by the API client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No response reached us: timeout, DNS failure, refused connection.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A 401 could not be recovered by refreshing the session.
    /// A forced logout has already happened when this is returned.
    #[error("Session refresh failed: {reason}")]
    AuthRefreshFailed { reason: String },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// The HTTP status this error corresponds to, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::AuthRefreshFailed { .. } => Some(401),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the caller should treat the user as signed out.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Best-effort server message: the `message` field of a JSON error body,
    /// else the raw body.
    pub fn server_message(&self) -> Option<String> {
        let Self::Http { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .or_else(|| (!body.is_empty()).then(|| body.clone()))
    }
}
