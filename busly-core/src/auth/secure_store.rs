//! Key/value backends for secret material.

use crate::db::Database;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A small string key/value store for credentials.
///
/// Implementations must be safe to share between tasks. Calls are short and
/// synchronous; callers never hold a store across an `.await`.
pub trait SecureStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Secure items kept in the app database's `secure_items` table.
pub struct SqliteSecureStore {
    db: Mutex<Database>,
}

impl SqliteSecureStore {
    /// Wrap an opened database. Runs migrations so the table exists.
    pub fn new(db: Database) -> anyhow::Result<Self> {
        db.migrate()?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StorageError> {
        let db = self
            .db
            .lock()
            .map_err(|_| StorageError::Unavailable("database lock poisoned".to_string()))?;
        Ok(f(&db)?)
    }
}

impl SecureStore for SqliteSecureStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_db(|db| db.get_secure_item(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_db(|db| db.set_secure_item(key, value))
    }

    fn delete_item(&self, key: &str) -> Result<(), StorageError> {
        self.with_db(|db| db.delete_secure_item(key))
    }
}

/// In-process store, used by tests and ephemeral sessions.
///
/// Can be flipped unavailable to behave like a locked keystore.
#[derive(Default)]
pub struct MemorySecureStore {
    items: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("keystore locked".to_string()));
        }
        self.items
            .lock()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
    }
}

impl SecureStore for MemorySecureStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_item(&self, key: &str) -> Result<(), StorageError> {
        self.items()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn SecureStore) {
        assert!(store.get_item("k").unwrap().is_none());
        store.set_item("k", "v1").unwrap();
        store.set_item("k", "v2").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v2"));
        store.delete_item("k").unwrap();
        store.delete_item("k").unwrap();
        assert!(store.get_item("k").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        exercise(&MemorySecureStore::new());
    }

    #[test]
    fn test_sqlite_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open_at(tmp.path().join("secure.db")).unwrap();
        exercise(&SqliteSecureStore::new(db).unwrap());
    }

    #[test]
    fn test_unavailable_memory_store_errors() {
        let store = MemorySecureStore::new();
        store.set_item("k", "v").unwrap();
        store.set_unavailable(true);

        assert!(matches!(
            store.set_item("k", "w"),
            Err(StorageError::Unavailable(_))
        ));
        assert!(store.get_item("k").is_err());

        store.set_unavailable(false);
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v"));
    }
}
