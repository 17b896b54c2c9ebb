//! Shared application state for the hub server.
//!
//! Startup errors are explicit (Result instead of panic).

use std::sync::Arc;

use globalstore_core::error::Result;

use crate::config::{HubConfig, StorageSection};
use crate::dispatch::Hub;
use crate::policy::HubPolicy;
use crate::store::{FileStore, MemoryStore, Store};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: HubConfig,
    hub: Hub,
}

impl AppState {
    /// Build application state: compile policy, open the store.
    pub fn new(cfg: HubConfig) -> Result<Self> {
        let policy = HubPolicy::from_config(&cfg.hub)?;
        let hub = match open_store(&cfg.storage)? {
            Backend::File(s) => Hub::new(policy, s)?,
            Backend::Memory(s) => Hub::new(policy, s)?,
        };

        if cfg.hub.allow_empty_origin {
            tracing::warn!("hub accepts callers without an origin (allow_empty_origin)");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, hub }),
        })
    }

    pub fn cfg(&self) -> &HubConfig {
        &self.inner.cfg
    }

    pub fn hub(&self) -> &Hub {
        &self.inner.hub
    }
}

enum Backend {
    File(FileStore),
    Memory(MemoryStore),
}

fn open_store(section: &StorageSection) -> Result<Backend> {
    match &section.path {
        Some(path) => {
            let store = FileStore::open(path)?;
            tracing::info!(path = %path, entries = store.entries()?.len(), "using file store");
            Ok(Backend::File(store))
        }
        None => {
            tracing::info!("using in-memory store");
            Ok(Backend::Memory(MemoryStore::new()))
        }
    }
}
