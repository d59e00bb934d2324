//! # Converter Store
//!
//! Concrete key-value store implementations (adapters) for the converter.
//! This crate provides the adapters that implement the `KeyValueStore` port,
//! plus [`Storage`], the facade the engine talks to.
//!
//! Storage problems (quota, unreadable file, disabled storage) are never
//! surfaced to callers: reads degrade to "absent" and writes report `false`.

pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use converter_types::KeyValueStore;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Failure-swallowing, typed access to a shared key-value store.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(store: impl KeyValueStore) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Storage backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Raw JSON value under `key`, `None` when absent or unreadable.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        match self.inner.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Storage read failed, treating as absent");
                None
            }
        }
    }

    /// Typed value under `key`, `None` when absent, unreadable or malformed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(key, error = %e, "Stored value has an unexpected shape");
                None
            }
        }
    }

    /// Writes `value` under `key`. Returns `false` if the write failed.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Could not serialize value for storage");
                return false;
            }
        };
        self.write(key, Some(value))
    }

    /// Deletes `key`. Returns `false` if the delete failed.
    pub fn remove(&self, key: &str) -> bool {
        self.write(key, None)
    }

    fn write(&self, key: &str, value: Option<Value>) -> bool {
        match self.inner.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Storage write failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

/// Build a storage facade from a store URL.
///
/// # Examples
///
/// ```ignore
/// // Process-local, lost on exit
/// let storage = build_store("memory://")?;
///
/// // JSON document on disk
/// let storage = build_store("file://.currency-converter.json")?;
/// let storage = build_store("/var/lib/converter/state.json")?;
/// ```
pub fn build_store(url: &str) -> anyhow::Result<Storage> {
    if url.starts_with("memory:") {
        tracing::debug!("Using in-memory store");
        return Ok(Storage::in_memory());
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    if path.trim().is_empty() {
        anyhow::bail!("Store URL does not name a file: {url:?}");
    }

    let store = JsonFileStore::open(PathBuf::from(path))?;
    tracing::debug!(path, "Using JSON file store");
    Ok(Storage::new(store))
}
