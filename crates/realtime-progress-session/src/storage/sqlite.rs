//! SQLite keyed store (feature-gated).

use std::{path::Path, sync::Mutex};

use realtime_progress_core::{KeyedStore, StoreError};
use rusqlite::{Connection, OptionalExtension, params};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS properties (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

fn sqlite_error(e: &rusqlite::Error) -> StoreError {
    StoreError::backend("sqlite", e.to_string())
}

/// SQLite store implementation.
///
/// Values survive restarts. A single connection is shared behind a mutex,
/// which serializes reads and writes per store.
pub struct SqliteKeyedStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyedStore {
    /// Open (or create) a database file.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| sqlite_error(&e))?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns error if the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| sqlite_error(&e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(SCHEMA, []).map_err(|e| sqlite_error(&e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyedStore for SqliteKeyedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        conn.query_row(
            "SELECT value FROM properties WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| sqlite_error(&e))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        conn.execute(
            "INSERT INTO properties (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| sqlite_error(&e))?;
        Ok(())
    }
}
