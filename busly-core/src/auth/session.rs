//! Authentication session state.
//!
//! [`AuthSession`] owns the signed-in user, drives the login flows, and is
//! the [`SessionHooks`] implementation the [`ApiClient`] calls back into when
//! a request is rejected with 401.

use super::backend::{AppleCredential, AuthBackend, LoginResult};
use super::error::AuthError;
use super::persist;
use super::secure_store::SecureStore;
use super::token_store::TokenStore;
use crate::api::{ApiClient, ApiError, SessionHooks};
use crate::models::{User, UserPatch};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, Weak};
use tracing::{debug, error, info, warn};

const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

/// Point-in-time view of the session for UI code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    authenticated: bool,
    is_loading: bool,
    error: Option<String>,
}

type RefreshFlight = Shared<BoxFuture<'static, bool>>;

pub struct AuthSession {
    me: Weak<AuthSession>,
    client: Arc<ApiClient>,
    backend: AuthBackend,
    tokens: TokenStore,
    store: Arc<dyn SecureStore>,
    state: RwLock<SessionState>,
    /// The refresh currently running, shared by every caller that asks.
    refresh_flight: Mutex<Option<RefreshFlight>>,
}

impl AuthSession {
    /// Create a session over `client` and register it for 401 handling.
    ///
    /// `store` holds the persisted profile; tokens go through the client's
    /// token store.
    pub fn new(client: Arc<ApiClient>, store: Arc<dyn SecureStore>) -> Arc<Self> {
        let session = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            backend: AuthBackend::new(client.clone()),
            tokens: client.token_store().clone(),
            client,
            store,
            state: RwLock::new(SessionState::default()),
            refresh_flight: Mutex::new(None),
        });

        let hooks: Weak<dyn SessionHooks> = Arc::downgrade(&session) as Weak<dyn SessionHooks>;
        session.client.set_session_hooks(hooks);
        session
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    // ========================================================================
    // State
    // ========================================================================

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_state(&self, f: impl FnOnce(&mut SessionState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read_state();
        SessionSnapshot {
            user: state.user.clone(),
            is_authenticated: state.authenticated && self.tokens.get().is_some(),
            is_loading: state.is_loading,
            error: state.error.clone(),
        }
    }

    pub fn user(&self) -> Option<User> {
        self.read_state().user.clone()
    }

    /// Signed in with a stored token pair. The access token may be expired.
    pub fn is_authenticated(&self) -> bool {
        self.read_state().authenticated && self.tokens.get().is_some()
    }

    pub fn clear_error(&self) {
        self.update_state(|s| s.error = None);
    }

    /// Drop tokens, persisted profile and in-memory state.
    fn clear_local(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear token pair");
        }
        if let Err(e) = persist::clear_profile(self.store.as_ref()) {
            warn!(error = %e, "Failed to clear persisted profile");
        }
        self.update_state(|s| *s = SessionState::default());
    }

    // ========================================================================
    // Start-up
    // ========================================================================

    /// Restore the previous session from storage.
    ///
    /// Valid tokens restore the session directly; expired ones are refreshed
    /// first. With no tokens any stale profile is discarded.
    pub async fn initialize(&self) -> SessionSnapshot {
        let profile = persist::load_profile(self.store.as_ref());

        let Some(tokens) = self.tokens.get() else {
            if profile.is_some() {
                debug!("Discarding persisted profile without tokens");
            }
            self.clear_local();
            return self.snapshot();
        };

        self.update_state(|s| {
            s.user = profile;
            s.authenticated = true;
        });

        if !tokens.is_valid_at(self.tokens.now_millis()) {
            info!("Stored access token expired, refreshing");
            if !self.refresh().await {
                return self.snapshot();
            }
        }

        if self.user().is_none() {
            match self.backend.me().await {
                Ok(user) => {
                    if let Err(e) = self.set_user(user) {
                        warn!(error = %e, "Failed to persist fetched profile");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to fetch profile"),
            }
        }

        info!(
            user_id = %self.user().map(|u| u.id).unwrap_or_default(),
            "Session restored"
        );
        self.snapshot()
    }

    // ========================================================================
    // Login flows
    // ========================================================================

    /// Email a one-time code to `email`.
    pub async fn send_code(&self, email: &str) -> Result<String, AuthError> {
        self.tracked("send_code", self.backend.send_code(email)).await
    }

    /// Sign in with an emailed one-time code.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<User, AuthError> {
        self.tracked("verify_code", async {
            let login = self.backend.verify_code(email, code).await?;
            self.establish(login)
        })
        .await
    }

    pub async fn sign_in_with_google(&self, id_token: &str) -> Result<User, AuthError> {
        self.tracked("google", async {
            let login = self.backend.google(id_token).await?;
            self.establish(login)
        })
        .await
    }

    pub async fn sign_in_with_apple(&self, credential: &AppleCredential) -> Result<User, AuthError> {
        self.tracked("apple", async {
            let login = self.backend.apple(credential).await?;
            self.establish(login)
        })
        .await
    }

    /// Run a user-initiated operation with loading and error bookkeeping.
    async fn tracked<T, F>(&self, operation: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        self.update_state(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = fut.await;

        self.update_state(|s| {
            s.is_loading = false;
            if let Err(e) = &result {
                s.error = Some(e.user_message());
            }
        });
        if let Err(e) = &result {
            warn!(operation, error = %e, "Auth operation failed");
        }
        result
    }

    fn establish(&self, login: LoginResult) -> Result<User, AuthError> {
        let LoginResult { user, tokens } = login;
        self.tokens.save(&tokens)?;
        if let Err(e) = persist::save_profile(self.store.as_ref(), &user) {
            warn!(error = %e, "Failed to persist profile");
        }

        info!(user_id = %user.id, "Signed in");
        self.update_state(|s| {
            s.user = Some(user.clone());
            s.authenticated = true;
        });
        Ok(user)
    }

    // ========================================================================
    // Refresh / logout
    // ========================================================================

    /// Exchange the refresh token for a new pair.
    ///
    /// Returns `false`, with the session cleared, if the refresh could not be
    /// completed for any reason. Concurrent callers share a single request,
    /// which runs to completion even if every caller stops waiting.
    pub async fn refresh(&self) -> bool {
        self.join_refresh().await
    }

    fn join_refresh(&self) -> RefreshFlight {
        let mut slot = self
            .refresh_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(flight) = slot.as_ref() {
            debug!("Joining in-flight refresh");
            return flight.clone();
        }

        let Some(session) = self.me.upgrade() else {
            return futures::future::ready(false).boxed().shared();
        };

        // Runs as a task: it must finish even if every waiter is dropped.
        let task = tokio::spawn(async move {
            let refreshed = session.run_refresh().await;
            *session
                .refresh_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
            refreshed
        });
        let me = self.me.clone();
        let flight = task
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    error!(error = %e, "Refresh task did not complete");
                    if let Some(session) = me.upgrade() {
                        *session
                            .refresh_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner) = None;
                    }
                    false
                })
            })
            .boxed()
            .shared();

        *slot = Some(flight.clone());
        flight
    }

    async fn run_refresh(&self) -> bool {
        let Some(current) = self.tokens.get() else {
            debug!("No refresh token stored");
            self.clear_local();
            return false;
        };

        let failure = match self.backend.refresh(&current.refresh_token).await {
            Ok(tokens) => match self.tokens.save(&tokens) {
                Ok(()) => {
                    info!(expires_at = tokens.expires_at, "Session refreshed");
                    return true;
                }
                Err(e) => AuthError::from(e),
            },
            Err(e) => e,
        };

        error!(error = %failure, "Session refresh failed, clearing session");
        self.clear_local();
        self.update_state(|s| s.error = Some(SESSION_EXPIRED.to_string()));
        false
    }

    /// Sign out. The backend is told on a best-effort basis; local state is
    /// always cleared. Safe to call when already signed out.
    pub async fn logout(&self) {
        if let Some(tokens) = self.tokens.get() {
            if let Err(e) = self.backend.logout(&tokens.refresh_token).await {
                warn!(error = %e, "Backend logout failed, clearing locally");
            }
        }
        self.clear_local();
        info!("Logged out");
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// Replace the profile and persist it.
    pub fn set_user(&self, user: User) -> Result<(), AuthError> {
        persist::save_profile(self.store.as_ref(), &user)?;
        self.update_state(|s| s.user = Some(user));
        Ok(())
    }

    /// Apply `patch` to the current profile and persist the result.
    pub fn update_user(&self, patch: UserPatch) -> Result<User, AuthError> {
        let mut user = self.user().ok_or(AuthError::NotAuthenticated)?;
        if patch.is_empty() {
            return Ok(user);
        }
        patch.apply(&mut user);
        self.set_user(user.clone())?;
        debug!(user_id = %user.id, "Profile updated");
        Ok(user)
    }
}

#[async_trait]
impl SessionHooks for AuthSession {
    async fn refresh_session(&self) -> Result<bool, ApiError> {
        Ok(self.refresh().await)
    }

    async fn force_logout(&self) {
        self.logout().await;
        self.update_state(|s| s.error = Some(SESSION_EXPIRED.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemorySecureStore, TokenPair};
    use crate::clock::ManualClock;
    use crate::config::ApiConfig;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000_000;

    struct Fixture {
        store: Arc<MemorySecureStore>,
        clock: Arc<ManualClock>,
        session: Arc<AuthSession>,
    }

    /// A session whose backend is unreachable; tests here never hit the network.
    fn fixture() -> Fixture {
        let store = Arc::new(MemorySecureStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let tokens = TokenStore::new(store.clone(), clock.clone());
        let config = ApiConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_millis(200));
        let client = Arc::new(ApiClient::new(&config, tokens).unwrap());
        let session = AuthSession::new(client, store.clone());
        Fixture {
            store,
            clock,
            session,
        }
    }

    fn user(id: &str) -> User {
        serde_json::from_value(serde_json::json!({ "_id": id, "name": "Ana" })).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_without_tokens_is_signed_out() {
        let f = fixture();
        persist::save_profile(f.store.as_ref(), &user("stale")).unwrap();

        let snapshot = f.session.initialize().await;

        assert_eq!(snapshot, SessionSnapshot::default());
        assert!(persist::load_profile(f.store.as_ref()).is_none());
    }

    #[tokio::test]
    async fn test_initialize_restores_valid_session() {
        let f = fixture();
        f.session
            .tokens()
            .save(&TokenPair::new("a1", "r1", NOW + 60_000))
            .unwrap();
        persist::save_profile(f.store.as_ref(), &user("u1")).unwrap();

        let snapshot = f.session.initialize().await;

        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.user.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_refresh_without_tokens_fails_quietly() {
        let f = fixture();
        assert!(!f.session.refresh().await);
        assert!(!f.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_when_signed_out_is_noop() {
        let f = fixture();
        f.session.logout().await;
        f.session.logout().await;
        assert_eq!(f.session.snapshot(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn test_authenticated_requires_tokens() {
        let f = fixture();
        f.session
            .tokens()
            .save(&TokenPair::new("a1", "r1", NOW + 1_000))
            .unwrap();
        persist::save_profile(f.store.as_ref(), &user("u1")).unwrap();
        f.session.initialize().await;
        assert!(f.session.is_authenticated());

        // Expiry alone does not sign the user out; losing the pair does.
        f.clock.advance(Duration::from_secs(5));
        assert!(f.session.is_authenticated());

        f.session.tokens().clear().unwrap();
        assert!(!f.session.is_authenticated());
    }

    #[test]
    fn test_update_user_requires_a_user() {
        let f = fixture();
        let patch = UserPatch {
            name: Some("New".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.session.update_user(patch),
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_update_user_persists() {
        let f = fixture();
        f.session.set_user(user("u1")).unwrap();

        let updated = f
            .session
            .update_user(UserPatch {
                phone: Some("+38970000000".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("+38970000000"));
        let stored = persist::load_profile(f.store.as_ref()).unwrap();
        assert_eq!(stored.phone.as_deref(), Some("+38970000000"));
        assert_eq!(stored.name, "Ana");
    }

    #[test]
    fn test_clear_error() {
        let f = fixture();
        f.session.update_state(|s| s.error = Some("boom".to_string()));
        assert_eq!(f.session.snapshot().error.as_deref(), Some("boom"));
        f.session.clear_error();
        assert!(f.session.snapshot().error.is_none());
    }
}
