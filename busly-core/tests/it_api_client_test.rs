//! Integration tests for bearer attachment and 401 refresh-and-replay

use async_trait::async_trait;
use busly_core::{
    ApiClient, ApiConfig, ApiError, ApiRequest, ManualClock, MemorySecureStore, SessionHooks,
    TokenPair, TokenStore,
};
use mockito::{Matcher, Server};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio_test::{assert_err, assert_ok};

const NOW: i64 = 1_700_000_000_000;

/// Hooks that count invocations and hand out a fixed pair on refresh.
struct CountingHooks {
    tokens: TokenStore,
    next: Option<TokenPair>,
    refreshes: AtomicUsize,
    logouts: AtomicUsize,
}

impl CountingHooks {
    fn new(tokens: TokenStore, next: Option<TokenPair>) -> Arc<Self> {
        Arc::new(Self {
            tokens,
            next,
            refreshes: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
        })
    }

    fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionHooks for CountingHooks {
    async fn refresh_session(&self) -> Result<bool, ApiError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match &self.next {
            Some(pair) => {
                self.tokens.save(pair).expect("save refreshed pair");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn force_logout(&self) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.tokens.clear().expect("clear tokens");
    }
}

fn setup(base_url: &str) -> (TokenStore, ApiClient) {
    let tokens = TokenStore::new(
        Arc::new(MemorySecureStore::new()),
        Arc::new(ManualClock::new(NOW)),
    );
    let client = ApiClient::new(&ApiConfig::new(base_url), tokens.clone()).expect("client");
    (tokens, client)
}

fn attach(client: &ApiClient, hooks: &Arc<CountingHooks>) {
    let weak: Weak<dyn SessionHooks> = Arc::downgrade(hooks) as Weak<dyn SessionHooks>;
    client.set_session_hooks(weak);
}

#[tokio::test]
async fn valid_token_is_attached_without_refresh() {
    //* Given
    let mut server = Server::new_async().await;
    let (tokens, client) = setup(&server.url());
    tokens
        .save(&TokenPair::new("a1", "r1", NOW + 60_000))
        .unwrap();
    let hooks = CountingHooks::new(tokens.clone(), None);
    attach(&client, &hooks);

    let mock = server
        .mock("GET", "/profile/123")
        .match_header("authorization", "Bearer a1")
        .with_status(200)
        .with_body(r#"{"_id":"123"}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let response = client
        .execute(ApiRequest::get("/profile/123"))
        .await
        .expect("request should succeed");

    //* Then
    mock.assert_async().await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(hooks.refreshes(), 0);
}

#[tokio::test]
async fn expired_token_is_not_attached_and_failed_refresh_logs_out() {
    //* Given
    let mut server = Server::new_async().await;
    let (tokens, client) = setup(&server.url());
    tokens.save(&TokenPair::new("a1", "r1", NOW - 1)).unwrap();
    let hooks = CountingHooks::new(tokens.clone(), None);
    attach(&client, &hooks);

    let mock = server
        .mock("GET", "/auth/me")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    //* When
    let result = client.execute(ApiRequest::get("/auth/me")).await;

    //* Then
    mock.assert_async().await;
    let err = assert_err!(result);
    assert!(matches!(err, ApiError::AuthRefreshFailed { .. }));
    assert!(err.is_unauthorized());
    assert_eq!(hooks.refreshes(), 1);
    assert_eq!(hooks.logouts(), 1);
    assert!(tokens.get().is_none());
}

#[tokio::test]
async fn unauthorized_then_refresh_replays_with_new_token() {
    //* Given
    let mut server = Server::new_async().await;
    let (tokens, client) = setup(&server.url());
    tokens
        .save(&TokenPair::new("a1", "r1", NOW + 60_000))
        .unwrap();
    let hooks = CountingHooks::new(
        tokens.clone(),
        Some(TokenPair::new("a2", "r2", NOW + 3_600_000)),
    );
    attach(&client, &hooks);

    let rejected = server
        .mock("GET", "/profile/123")
        .match_header("authorization", "Bearer a1")
        .with_status(401)
        .with_body(r#"{"message":"jwt expired"}"#)
        .expect(1)
        .create_async()
        .await;
    let replayed = server
        .mock("GET", "/profile/123")
        .match_header("authorization", "Bearer a2")
        .with_status(200)
        .with_body(r#"{"_id":"123","name":"Ana"}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let response = assert_ok!(client.execute(ApiRequest::get("/profile/123")).await);

    //* Then
    rejected.assert_async().await;
    replayed.assert_async().await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["name"], "Ana");
    assert_eq!(hooks.refreshes(), 1);
    assert_eq!(hooks.logouts(), 0);
}

#[tokio::test]
async fn second_unauthorized_is_not_retried() {
    //* Given
    let mut server = Server::new_async().await;
    let (tokens, client) = setup(&server.url());
    tokens
        .save(&TokenPair::new("a1", "r1", NOW + 60_000))
        .unwrap();
    let hooks = CountingHooks::new(
        tokens.clone(),
        Some(TokenPair::new("a2", "r2", NOW + 3_600_000)),
    );
    attach(&client, &hooks);

    let first = server
        .mock("GET", "/bookings")
        .match_header("authorization", "Bearer a1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let replay = server
        .mock("GET", "/bookings")
        .match_header("authorization", "Bearer a2")
        .with_status(401)
        .with_body("still no")
        .expect(1)
        .create_async()
        .await;

    //* When
    let result = client.execute(ApiRequest::get("/bookings")).await;

    //* Then
    first.assert_async().await;
    replay.assert_async().await;
    assert!(matches!(
        result,
        Err(ApiError::Http { status: 401, ref body }) if body == "still no"
    ));
    assert_eq!(hooks.refreshes(), 1);
    assert_eq!(hooks.logouts(), 0);
}

#[tokio::test]
async fn request_without_refresh_returns_401() {
    //* Given
    let mut server = Server::new_async().await;
    let (tokens, client) = setup(&server.url());
    let hooks = CountingHooks::new(tokens.clone(), None);
    attach(&client, &hooks);

    let mock = server
        .mock("POST", "/auth/logout")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    //* When
    let result = client
        .execute(ApiRequest::post("/auth/logout").without_refresh())
        .await;

    //* Then
    mock.assert_async().await;
    assert!(matches!(result, Err(ApiError::Http { status: 401, .. })));
    assert_eq!(hooks.refreshes(), 0);
}

#[tokio::test]
async fn unauthorized_without_session_is_terminal() {
    //* Given
    let mut server = Server::new_async().await;
    let (_tokens, client) = setup(&server.url());

    let mock = server
        .mock("GET", "/station")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    //* When
    let result = client.execute(ApiRequest::get("/station")).await;

    //* Then
    mock.assert_async().await;
    assert!(matches!(result, Err(ApiError::Http { status: 401, .. })));
}

#[tokio::test]
async fn other_errors_pass_through_untouched() {
    //* Given
    let mut server = Server::new_async().await;
    let (tokens, client) = setup(&server.url());
    let hooks = CountingHooks::new(tokens.clone(), None);
    attach(&client, &hooks);

    let mock = server
        .mock("GET", "/station")
        .with_status(503)
        .with_body(r#"{"success":false,"message":"maintenance"}"#)
        .expect(2)
        .create_async()
        .await;

    //* When
    let raw = assert_ok!(client.execute(ApiRequest::get("/station")).await);
    let typed = client.get_json::<serde_json::Value>("/station").await;

    //* Then
    mock.assert_async().await;
    assert_eq!(raw.status().as_u16(), 503);
    let err = assert_err!(typed);
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.server_message().as_deref(), Some("maintenance"));
    assert_eq!(hooks.refreshes(), 0);
}

#[tokio::test]
async fn transport_failure_is_network_error() {
    // Nothing listens on the discard port.
    let (_tokens, client) = setup("http://127.0.0.1:9");

    let result = client.execute(ApiRequest::get("/station")).await;

    assert!(matches!(result, Err(ApiError::Network(_))));
}

#[tokio::test]
async fn json_body_and_query_are_sent() {
    //* Given
    let mut server = Server::new_async().await;
    let (_tokens, client) = setup(&server.url());

    let mock = server
        .mock("POST", "/privacy/update")
        .match_query(Matcher::UrlEncoded("user_id".into(), "u1".into()))
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(serde_json::json!({ "enabled": true })))
        .with_status(200)
        .with_body(r#"{"success":true,"data":{"ok":1}}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let request = ApiRequest::post("/privacy/update")
        .query("user_id", "u1")
        .json(&serde_json::json!({ "enabled": true }))
        .unwrap();
    let value: serde_json::Value = client.send(request).await.expect("send");

    //* Then
    mock.assert_async().await;
    assert_eq!(value["ok"], 1);
}
