//! JSON-file store: one object `{key: blob}` rewritten on every mutation.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write leaves the previous snapshot intact. The in-memory map is
//! only replaced after the file write succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use globalstore_core::error::{GlobalStoreError, Result};

use super::Store;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                GlobalStoreError::Internal(format!("store file {} is corrupt: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(GlobalStoreError::Internal(format!(
                    "read store file {} failed: {e}",
                    path.display()
                )))
            }
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "file store opened");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Persist `next`, then make it current.
    fn commit(&mut self, next: BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(&next)
            .map_err(|e| GlobalStoreError::Internal(format!("store encode failed: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                GlobalStoreError::Internal(format!("write store file {} failed: {e}", self.path.display()))
            })?;
        self.entries = next;
        Ok(())
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, blob: String) -> Result<()> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), blob);
        self.commit(next)
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        if !self.entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = self.entries.clone();
        next.remove(key);
        self.commit(next)?;
        Ok(true)
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn delete_many(&mut self, keys: &[String]) -> Result<usize> {
        let mut next = self.entries.clone();
        let removed = keys.iter().filter(|k| next.remove(k.as_str()).is_some()).count();
        if removed > 0 {
            self.commit(next)?;
        }
        Ok(removed)
    }

    fn is_blocking(&self) -> bool {
        true
    }
}
