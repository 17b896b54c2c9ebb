//! Persisted record and its text-safe blob encoding.
//!
//! Blob = base64(JSON `{"allowed": <pattern>, "value": <any>}`), one per key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GlobalStoreError, Result};
use crate::pattern::AccessPattern;

/// A stored value plus the pattern its writer attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Owner pattern, kept as source text so a bad entry cannot fail decoding.
    pub allowed: String,
    #[serde(default)]
    pub value: Value,
}

impl Record {
    pub fn new(allowed: &AccessPattern, value: Value) -> Self {
        Self {
            allowed: allowed.as_str().to_string(),
            value,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| GlobalStoreError::Internal(format!("record encode failed: {e}")))?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(blob: &str) -> Result<Self> {
        let json = STANDARD
            .decode(blob.trim())
            .map_err(|e| GlobalStoreError::Internal(format!("record is not base64: {e}")))?;
        serde_json::from_slice(&json)
            .map_err(|e| GlobalStoreError::Internal(format!("record is not valid json: {e}")))
    }

    /// Whether the owner pattern admits `domain`. Uncompilable patterns admit nobody.
    pub fn permits(&self, domain: &str) -> bool {
        AccessPattern::new(self.allowed.as_str())
            .map(|p| p.matches(domain))
            .unwrap_or(false)
    }
}
