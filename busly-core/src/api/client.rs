//! HTTP client with bearer-token attachment and 401 refresh-and-replay.
//!
//! Every backend call goes through [`ApiClient::execute`]. The lifecycle of a
//! single call is:
//!
//! 1. attach the current valid access token, if any
//! 2. dispatch with a bounded timeout; transport failures return immediately
//! 3. any non-401 response is handed back untouched
//! 4. on the first 401, ask the session to refresh, then replay the request
//!    once with the new token; if the refresh fails, force a logout
//!
//! A call refreshes at most once. The replay's outcome is final.

use super::envelope::decode_payload;
use super::error::ApiError;
use crate::auth::TokenStore;
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

// ============================================================================
// Session Hooks
// ============================================================================

/// Callbacks the client uses when a request comes back 401.
///
/// Implemented by the auth session; the client only holds a weak reference,
/// so registering hooks does not keep the session alive.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Try to obtain a fresh token pair. `Ok(true)` means the token store
    /// now holds a usable access token.
    async fn refresh_session(&self) -> Result<bool, ApiError>;

    /// Drop all credentials and session state.
    async fn force_logout(&self);
}

// ============================================================================
// Request / Response
// ============================================================================

/// Description of a backend call. Kept intact so it can be replayed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
    refresh_on_unauthorized: bool,
}

impl ApiRequest {
    /// A request for `path`, relative to the configured base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            refresh_on_unauthorized: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Override the client-wide timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Never trigger a session refresh for this request.
    ///
    /// Used for the refresh and logout calls themselves.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as `T` exactly.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode the body as `T`, unwrapping a `{ data }` envelope if present.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(decode_payload(&self.body)?)
    }

    /// Turn a non-2xx response into [`ApiError::Http`].
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(status: StatusCode, body: &[u8]) -> Self {
        Self {
            status,
            body: body.to_vec(),
        }
    }

    fn into_error(self) -> ApiError {
        ApiError::Http {
            status: self.status.as_u16(),
            body: String::from_utf8_lossy(&self.body).into_owned(),
        }
    }
}

/// A request on its way through the client, with its one-shot retry flag.
struct RequestRecord<'a> {
    request: &'a ApiRequest,
    retried: bool,
}

impl<'a> RequestRecord<'a> {
    fn new(request: &'a ApiRequest) -> Self {
        Self {
            request,
            retried: !request.refresh_on_unauthorized,
        }
    }

    /// Claim the single refresh-and-replay cycle. `false` if already used.
    fn begin_retry(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }
}

// ============================================================================
// Client
// ============================================================================

/// The single point of egress for backend calls.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenStore,
    hooks: RwLock<Option<Weak<dyn SessionHooks>>>,
}

impl ApiClient {
    /// Build a client for `config`, reading tokens from `tokens`.
    pub fn new(config: &ApiConfig, tokens: TokenStore) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Network)?;

        info!(base_url = %base_url, timeout_ms = config.timeout.as_millis() as u64, "API client ready");

        Ok(Self {
            http,
            base_url,
            tokens,
            hooks: RwLock::new(None),
        })
    }

    /// Register the session callbacks used on 401.
    pub fn set_session_hooks(&self, hooks: Weak<dyn SessionHooks>) {
        *self.hooks.write().unwrap_or_else(PoisonError::into_inner) = Some(hooks);
    }

    /// Detach the session callbacks; later 401s become terminal.
    pub fn clear_session_hooks(&self) {
        *self.hooks.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn session_hooks(&self) -> Option<Arc<dyn SessionHooks>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send `request`, refreshing and replaying once on 401.
    ///
    /// Non-401 responses are returned as-is, whatever their status. A 401
    /// that survives (or cannot attempt) the refresh becomes
    /// [`ApiError::Http`]; a failed refresh becomes
    /// [`ApiError::AuthRefreshFailed`] after the session has been logged out.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut record = RequestRecord::new(&request);

        let response = self.dispatch(record.request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if !record.begin_retry() {
            debug!(method = %request.method, path = %request.path, "401 on a request that may not refresh");
            return Err(response.into_error());
        }

        let Some(hooks) = self.session_hooks() else {
            debug!(method = %request.method, path = %request.path, "401 with no session attached");
            return Err(response.into_error());
        };

        info!(method = %request.method, path = %request.path, "Access rejected, refreshing session");

        match hooks.refresh_session().await {
            Ok(true) => {
                let replay = self.dispatch(record.request).await?;
                if replay.status() == StatusCode::UNAUTHORIZED {
                    warn!(method = %request.method, path = %request.path, "Replay still unauthorized");
                    return Err(replay.into_error());
                }
                Ok(replay)
            }
            Ok(false) => {
                warn!(path = %request.path, "Session refresh rejected, logging out");
                hooks.force_logout().await;
                Err(ApiError::AuthRefreshFailed {
                    reason: "refresh token rejected".to_string(),
                })
            }
            Err(e) => {
                error!(path = %request.path, error = %e, "Session refresh errored, logging out");
                hooks.force_logout().await;
                Err(ApiError::AuthRefreshFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Send `request`, require a 2xx and decode the (possibly enveloped) body.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.error_for_status()?.payload()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = request.path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, path))?;

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    /// One network round trip: attach, send, read the body.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(request)?;
        let mut builder = self.http.request(request.method.clone(), url);

        // Re-read on every dispatch so a replay picks up the refreshed token.
        let token = self.tokens.valid_access_token();
        let authenticated = token.is_some();
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "Request failed");
            ApiError::Network(e)
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(ApiError::Network)?.to_vec();

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            authenticated,
            "Request complete"
        );

        Ok(ApiResponse { status, body })
    }
}
