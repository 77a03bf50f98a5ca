//! SQLite database layer for Busly.
//!
//! Two key/value tables live here:
//! - `secure_items`: the token pair and the persisted session profile
//! - `settings`: app preferences and the trip search form

mod migrations;

use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// The key/value tables, which share a schema.
#[derive(Debug, Clone, Copy)]
enum KvTable {
    SecureItems,
    Settings,
}

impl KvTable {
    fn upsert_sql(self) -> &'static str {
        match self {
            Self::SecureItems => {
                "INSERT INTO secure_items (key, value, updated_at) VALUES (?1, ?2, unixepoch())
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"
            }
            Self::Settings => {
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, unixepoch())
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"
            }
        }
    }

    fn select_sql(self) -> &'static str {
        match self {
            Self::SecureItems => "SELECT value FROM secure_items WHERE key = ?1",
            Self::Settings => "SELECT value FROM settings WHERE key = ?1",
        }
    }

    fn delete_sql(self) -> &'static str {
        match self {
            Self::SecureItems => "DELETE FROM secure_items WHERE key = ?1",
            Self::Settings => "DELETE FROM settings WHERE key = ?1",
        }
    }
}

/// Handle to the app database file.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open the database at [`Database::default_path`].
    pub fn open() -> anyhow::Result<Self> {
        Self::open_at(Self::default_path()?)
    }

    /// Open (creating if needed) the database at `path`.
    ///
    /// The file holds credentials, so on Unix it is restricted to the owner.
    pub fn open_at(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        restrict_permissions(&path);
        Ok(Self { conn, path })
    }

    /// `<data_dir>/busly/busly.db`, e.g. `~/.local/share/busly/busly.db` on Linux.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("busly").join("busly.db"))
    }

    /// Bring the schema up to date. Idempotent.
    pub fn migrate(&self) -> anyhow::Result<()> {
        migrations::run_migrations(&self.conn)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn put(&self, table: KvTable, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(table.upsert_sql(), [key, value])?;
        Ok(())
    }

    fn fetch(&self, table: KvTable, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row(table.select_sql(), [key], |row| row.get(0))
            .optional()
    }

    fn remove(&self, table: KvTable, key: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(table.delete_sql(), [key])?;
        Ok(())
    }

    // =========================================================================
    // Secure items
    // =========================================================================

    pub fn set_secure_item(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.put(KvTable::SecureItems, key, value)
    }

    pub fn get_secure_item(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.fetch(KvTable::SecureItems, key)
    }

    /// Removing a missing item is not an error.
    pub fn delete_secure_item(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.remove(KvTable::SecureItems, key)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.put(KvTable::Settings, key, value)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.fetch(KvTable::Settings, key)
    }

    pub fn delete_setting(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.remove(KvTable::Settings, key)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to restrict database permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
