//! The access/refresh token pair.

use serde::{Deserialize, Serialize};

/// Credentials issued by the backend on login and on every refresh.
///
/// All three fields are required: a record missing any of them does not
/// deserialize, so a partial pair can never be read back as valid.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Credential used only to mint a new pair.
    pub refresh_token: String,
    /// Expiry of `access_token`, epoch milliseconds.
    pub expires_at: i64,
}

impl TokenPair {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Whether the access token is usable at `now_millis`.
    ///
    /// A token expiring exactly at `now_millis` is already expired.
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.expires_at > now_millis
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
