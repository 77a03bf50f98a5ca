//! Schema migrations.
//!
//! Applied migrations are recorded by name in `schema_migrations`; each
//! pending one runs in its own transaction together with its record.

use rusqlite::Connection;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_settings",
        sql: "CREATE TABLE IF NOT EXISTS settings (
                  key TEXT PRIMARY KEY,
                  value TEXT NOT NULL,
                  updated_at INTEGER NOT NULL DEFAULT (unixepoch())
              );",
    },
    Migration {
        name: "002_secure_items",
        sql: "CREATE TABLE IF NOT EXISTS secure_items (
                  key TEXT PRIMARY KEY,
                  value TEXT NOT NULL,
                  created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                  updated_at INTEGER NOT NULL DEFAULT (unixepoch())
              );",
    },
];

const HISTORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    name TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL DEFAULT (unixepoch())
);";

fn is_applied(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )
}

/// Apply every migration not yet recorded.
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(HISTORY_TABLE)?;

    for migration in MIGRATIONS {
        if is_applied(conn, migration.name)? {
            continue;
        }

        tracing::info!(migration = migration.name, "Applying migration");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (name) VALUES (?1)",
            [migration.name],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(
            tables(&conn),
            vec!["schema_migrations", "secure_items", "settings"]
        );
    }

    #[test]
    fn test_rerun_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        for _ in 0..3 {
            run_migrations(&conn).unwrap();
        }

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_only_pending_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(HISTORY_TABLE).unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (name) VALUES (?1)",
            [MIGRATIONS[0].name],
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        assert!(is_applied(&conn, "002_secure_items").unwrap());
        assert!(tables(&conn).contains(&"secure_items".to_string()));
    }
}
