//! Store backends.
//!
//! The hub owns exactly one store and is its only user. Values are opaque
//! text blobs (see `globalstore_core::record`); the store never interprets
//! them.

pub mod file;
pub mod memory;

use globalstore_core::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Synchronous key -> blob storage.
pub trait Store: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, blob: String) -> Result<()>;
    /// Returns whether the key existed.
    fn delete(&mut self, key: &str) -> Result<bool>;
    /// Snapshot of every entry.
    fn entries(&self) -> Result<Vec<(String, String)>>;

    /// Remove `keys` as one mutation: either all of them go or none do.
    /// Returns how many existed.
    fn delete_many(&mut self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Whether mutations block on I/O. The hub moves such work off the async
    /// workers.
    fn is_blocking(&self) -> bool {
        false
    }
}
