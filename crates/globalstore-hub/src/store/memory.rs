use std::sync::Arc;

use dashmap::DashMap;
use globalstore_core::error::Result;

use super::Store;

/// In-memory store. Clones share the same map, so a test can keep a handle
/// while the hub owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Raw blob stored under `key`.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Seed a raw blob, bypassing the hub.
    pub fn insert_raw(&self, key: impl Into<String>, blob: impl Into<String>) {
        self.entries.insert(key.into(), blob.into());
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_raw(key))
    }

    fn set(&mut self, key: &str, blob: String) -> Result<()> {
        self.entries.insert(key.to_string(), blob);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }
}
