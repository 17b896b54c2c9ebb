//! Hub config loader (strict parsing).

pub mod schema;

use std::fs;

use globalstore_core::error::{GlobalStoreError, Result};

pub use schema::{HubConfig, HubSection, ServerSection, StorageSection};

pub fn load_from_file(path: &str) -> Result<HubConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| GlobalStoreError::Configuration(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HubConfig> {
    let cfg: HubConfig = serde_yaml::from_str(s)
        .map_err(|e| GlobalStoreError::Configuration(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
