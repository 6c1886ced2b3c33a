//! Key-Value Storage
//!
//! Two storage tiers back every service in this crate:
//!
//! - **durable**: survives restarts (SQLite file)
//! - **volatile**: lives as long as the process (in-memory map)
//!
//! Values are opaque strings. Structured records are stored as JSON under the
//! well-known keys in [`keys`], always read and written as a whole.

use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Persisted key names
pub mod keys {
    pub const USERS: &str = "users";
    pub const CURRENT_USER: &str = "currentUser";
    pub const USER_TOKEN: &str = "userToken";
    pub const ADMIN_REQUESTS: &str = "adminRequests";
    pub const EMAIL_NOTIFICATIONS: &str = "emailNotifications";
    pub const THEME: &str = "theme";
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store (volatile tier, tests)
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// SQLite-backed store (durable tier)
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store database
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;

        info!("Storage opened: {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.lock().execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// The durable and volatile storage pair
#[derive(Clone)]
pub struct StorageTiers {
    pub durable: Arc<dyn KeyValueStore>,
    pub volatile: Arc<dyn KeyValueStore>,
}

impl StorageTiers {
    pub fn new(durable: Arc<dyn KeyValueStore>, volatile: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, volatile }
    }

    /// Both tiers in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Durable first, then volatile
    pub fn both(&self) -> [&dyn KeyValueStore; 2] {
        [self.durable.as_ref(), self.volatile.as_ref()]
    }
}

/// Read and decode a JSON value.
///
/// Missing keys, store failures and undecodable values all yield `None`.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("Key not present: {}", key);
            return None;
        }
        Err(e) => {
            warn!("Failed to read {}: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring undecodable value for {}: {}", key, e);
            None
        }
    }
}

/// Encode and write a JSON value
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("missing").unwrap().is_none());

        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));

        store.remove("theme").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_sqlite_store_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("theme", "light").unwrap();
        store.set("theme", "dark").unwrap();

        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));

        store.remove("theme").unwrap();
        assert!(store.get("theme").unwrap().is_none());
    }

    #[test]
    fn test_read_json_swallows_garbage() {
        let store = MemoryStore::new();
        store.set(keys::USERS, "{not json").unwrap();

        let users: Option<Vec<String>> = read_json(&store, keys::USERS);
        assert!(users.is_none());
    }

    #[test]
    fn test_write_then_read_json() {
        let store = MemoryStore::new();
        write_json(&store, keys::ADMIN_REQUESTS, &vec!["a", "b"]).unwrap();

        let values: Vec<String> = read_json(&store, keys::ADMIN_REQUESTS).unwrap();
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }
}
