//! Thread-safe item store.

use parking_lot::RwLock;
use std::collections::HashMap;

/// A readable and writable key-value store attached to a request.
///
/// Unlike scope bindings, items can be overwritten. Values are JSON so the
/// host can log or forward them without knowing their Rust types.
#[derive(Debug, Default)]
pub struct ItemBag {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl ItemBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Stores a value, returning the one it replaced.
    pub fn insert(&self, key: impl Into<String>, value: serde_json::Value) -> Option<serde_json::Value> {
        self.data.write().insert(key.into(), value)
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, serde_json::Value> {
        self.data.read().clone()
    }
}
