//! Persistence of the current token pair.

use super::secure_store::{SecureStore, StorageError};
use super::tokens::TokenPair;
use crate::clock::{Clock, SharedClock};
use std::sync::Arc;
use tracing::{debug, warn};

/// Key the pair is stored under.
pub const TOKEN_KEY: &str = "auth_tokens";

/// Reads and writes the token pair; the single source of truth for the API client.
///
/// Cheap to clone: clones share the same backend and clock.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn SecureStore>,
    clock: SharedClock,
}

impl TokenStore {
    pub fn new(store: Arc<dyn SecureStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Current time according to the store's clock, epoch milliseconds.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Persist `tokens`, replacing any previous pair.
    pub fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        let json = serde_json::to_string(tokens)?;
        self.store.set_item(TOKEN_KEY, &json)?;
        debug!(expires_at = tokens.expires_at, "Saved token pair");
        Ok(())
    }

    /// The stored pair, or `None` when absent, corrupt or unreadable.
    pub fn get(&self) -> Option<TokenPair> {
        let raw = match self.store.get_item(TOKEN_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read token pair, treating as absent");
                return None;
            }
        };

        match serde_json::from_str::<TokenPair>(&raw) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!(error = %e, "Stored token pair is corrupt, treating as absent");
                None
            }
        }
    }

    /// Remove the stored pair. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.delete_item(TOKEN_KEY)?;
        debug!("Cleared token pair");
        Ok(())
    }

    /// The access token, only while it has not yet expired.
    pub fn valid_access_token(&self) -> Option<String> {
        let tokens = self.get()?;
        if tokens.is_valid_at(self.now_millis()) {
            Some(tokens.access_token)
        } else {
            debug!(expires_at = tokens.expires_at, "Access token expired");
            None
        }
    }
}
