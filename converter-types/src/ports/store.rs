//! Key-value store port.
//!
//! Values are JSON documents stored under string keys. Each key is written
//! atomically as one document; there is no cross-key transaction.

use serde_json::Value;

use crate::error::StoreError;

pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads the value under `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Writes `value` under `key`; `None` deletes the key.
    fn set(&self, key: &str, value: Option<Value>) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.set(key, None)
    }
}
