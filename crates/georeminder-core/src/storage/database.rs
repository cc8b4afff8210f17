//! SQLite-backed reminder persistence.
//!
//! The reminder collection is kept the way the app has always stored it: one
//! JSON array under the `georeminders` key of a small key-value table.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::data_dir;
use crate::error::PersistenceError;
use crate::reminder::Reminder;
use crate::store::ReminderRepository;

/// Key holding the serialized reminder collection.
pub const REMINDERS_KEY: &str = "georeminders";

/// SQLite database for reminder storage.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// File backing this database, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Open the database at `~/.config/georeminder/georeminder.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self, PersistenceError> {
        let dir = data_dir().map_err(|e| PersistenceError::DataDir(e.to_string()))?;
        Self::open_at(dir.join("georeminder.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let conn = Connection::open(&path).map_err(|source| PersistenceError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self {
            conn,
            path: Some(path),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and throwaway sessions).
    pub fn open_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn, path: None };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl ReminderRepository for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn load(&self) -> Result<Vec<Reminder>, PersistenceError> {
        match self.kv_get(REMINDERS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, reminders: &[Reminder]) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(reminders)?;
        self.kv_set(REMINDERS_KEY, &json)?;
        Ok(())
    }
}
