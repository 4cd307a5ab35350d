//! Persistent key-value storage for the instance identity and transport token.
//!
//! The agent only ever needs two keys to survive a relaunch, so the store
//! contract is a minimal synchronous string map. Hosts inject whatever backs
//! it on their platform (keychain, preferences, a file); [`FileStore`] covers
//! the common case and [`MemoryStore`] covers tests and embedding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;

/// Store key holding the backend-assigned instance identifier.
pub const INSTANCE_ID_KEY: &str = "px_instance_id";

/// Store key holding the opaque push-transport token.
pub const TRANSPORT_TOKEN_KEY: &str = "px_transport_token";

/// Durable synchronous key-value storage.
///
/// A read failure is *not* fatal to the agent: callers treat it as "absent"
/// and fall open to re-registration.
pub trait InstanceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store. State does not survive the process; intended for tests
/// and hosts that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StoreError::read(key, format!("lock poisoned: {e}")))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StoreError::write(key, format!("lock poisoned: {e}")))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed store: a flat JSON object persisted on every write.
///
/// Writes go through a temp file + rename so a crash mid-write never leaves
/// a truncated store behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or create) a store at `path`. An unreadable or corrupt file is
    /// treated as empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::read(path.display().to_string(), e)),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &HashMap<String, String>, key: &str) -> Result<(), StoreError> {
        let raw = serde_json::to_vec_pretty(values).map_err(|e| StoreError::write(key, e))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| StoreError::write(key, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::write(key, e))?;
        Ok(())
    }
}

impl InstanceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StoreError::read(key, format!("lock poisoned: {e}")))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StoreError::write(key, format!("lock poisoned: {e}")))?;
        values.insert(key.to_string(), value.to_string());
        self.flush(&values, key)
    }
}
