//! Authentication endpoints.
//!
//! Login endpoints exchange a one-time credential (email code, Google ID
//! token, Apple identity token) for a token pair plus profile. None of them,
//! nor the refresh and logout calls, may trigger a session refresh on 401.

use super::error::AuthError;
use super::tokens::TokenPair;
use crate::api::{ApiClient, ApiError, ApiRequest, ApiResponse};
use crate::models::User;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// What a successful login returns.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub tokens: TokenPair,
}

/// Credential produced by the platform's Apple sign-in SDK.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleCredential {
    pub identity_token: String,
    pub authorization_code: Option<String>,
    /// Apple's stable user identifier.
    pub user: String,
    pub email: Option<String>,
    pub full_name: Option<AppleFullName>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleFullName {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

// ============================================================================
// Wire formats
// ============================================================================

/// Expiry as either epoch milliseconds or an RFC 3339 timestamp.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Expiry {
    Millis(i64),
    Timestamp(String),
}

impl Expiry {
    fn to_millis(&self) -> Result<i64, AuthError> {
        match self {
            Self::Millis(ms) => Ok(*ms),
            Self::Timestamp(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.timestamp_millis())
                .map_err(|e| AuthError::InvalidResponse(format!("bad expiry {raw:?}: {e}"))),
        }
    }
}

/// Token fields, spelled camelCase or snake_case depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTokens {
    #[serde(alias = "access_token")]
    access_token: String,
    #[serde(alias = "refresh_token")]
    refresh_token: String,
    #[serde(default, alias = "expires_at")]
    expires_at: Option<Expiry>,
}

impl WireTokens {
    fn into_pair(self, fallback_expiry: Option<&Expiry>) -> Result<TokenPair, AuthError> {
        let expiry = self
            .expires_at
            .as_ref()
            .or(fallback_expiry)
            .ok_or_else(|| AuthError::InvalidResponse("token expiry missing".to_string()))?;
        Ok(TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: expiry.to_millis()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    user: User,
    tokens: WireTokens,
    /// The email-code endpoint reports expiry next to, not inside, `tokens`.
    #[serde(default, alias = "expires_at")]
    expires_at: Option<Expiry>,
}

impl LoginPayload {
    fn into_result(self) -> Result<LoginResult, AuthError> {
        let tokens = self.tokens.into_pair(self.expires_at.as_ref())?;
        Ok(LoginResult {
            user: self.user,
            tokens,
        })
    }
}

/// The top-level `message` of a send-code reply. Any `data` object the
/// backend adds alongside it is ignored.
fn sent_message(response: &ApiResponse) -> Result<String, ApiError> {
    let body: Value = if response.bytes().is_empty() {
        Value::Null
    } else {
        response.json()?
    };
    Ok(body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| "Code sent".to_string()))
}

// ============================================================================
// Endpoints
// ============================================================================

/// Typed access to the `/auth` endpoints.
#[derive(Clone)]
pub struct AuthBackend {
    client: Arc<ApiClient>,
}

impl AuthBackend {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Ask the backend to email a one-time code. Returns the server's message.
    pub async fn send_code(&self, email: &str) -> Result<String, AuthError> {
        let request = ApiRequest::post("/auth/otp-login")
            .json(&json!({ "email": email }))?
            .without_refresh();
        let response = self.client.execute(request).await?.error_for_status()?;
        Ok(sent_message(&response)?)
    }

    /// Exchange an emailed code for a session.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<LoginResult, AuthError> {
        let request = ApiRequest::post("/auth/verify-otp")
            .json(&json!({ "email": email, "otp": code }))?
            .without_refresh();
        self.login(request).await
    }

    /// Exchange a Google ID token for a session.
    pub async fn google(&self, id_token: &str) -> Result<LoginResult, AuthError> {
        let request = ApiRequest::post("/auth/google")
            .json(&json!({ "token": id_token }))?
            .without_refresh();
        self.login(request).await
    }

    /// Exchange an Apple identity token for a session.
    pub async fn apple(&self, credential: &AppleCredential) -> Result<LoginResult, AuthError> {
        let request = ApiRequest::post("/auth/apple-login")
            .json(credential)?
            .without_refresh();
        self.login(request).await
    }

    /// Mint a new pair from `refresh_token`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let request = ApiRequest::post("/auth/generate-refresh-token")
            .json(&json!({ "refreshToken": refresh_token }))?
            .without_refresh();
        let tokens: WireTokens = self.client.send(request).await?;
        tokens.into_pair(None)
    }

    /// Tell the backend to revoke `refresh_token`. The response body is ignored.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let request = ApiRequest::post("/auth/logout")
            .json(&json!({ "refreshToken": refresh_token }))?
            .without_refresh();
        self.client.execute(request).await?.error_for_status()?;
        Ok(())
    }

    /// Profile of the signed-in user.
    pub async fn me(&self) -> Result<User, AuthError> {
        Ok(self.client.get_json("/auth/me").await?)
    }

    async fn login(&self, request: ApiRequest) -> Result<LoginResult, AuthError> {
        let path = request.path().to_string();
        let payload: LoginPayload = self.client.send(request).await?;
        debug!(path = %path, user_id = %payload.user.id, "Login accepted");
        payload.into_result()
    }
}
