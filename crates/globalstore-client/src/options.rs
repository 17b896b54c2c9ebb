//! Client options and their resolution.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_core::AccessPattern;

/// Hosted hub used when no URL is given.
pub const DEFAULT_HUB_URL: &str = "https://cdn.ilkkapeltola.com/global-storage/latest/hub.html";
/// Deadline for the handshake and for each request.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientOptions {
    /// Hub location.
    #[serde(default)]
    pub url: Option<String>,
    /// Pattern attached to every record this client writes. Defaults to an
    /// exact match on the caller's own registrable domain.
    #[serde(default)]
    pub allow: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: None,
            allow: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ClientOptions {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_allow(mut self, allow: impl Into<String>) -> Self {
        self.allow = Some(allow.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn hub_url(&self) -> Result<Url> {
        let raw = self.url.as_deref().unwrap_or(DEFAULT_HUB_URL);
        Url::parse(raw).map_err(|e| GlobalStoreError::Configuration(format!("hub url {raw:?}: {e}")))
    }

    /// Declared pattern for a caller whose registrable domain is `own_domain`.
    pub fn pattern(&self, own_domain: &str) -> Result<AccessPattern> {
        let pattern = match self.allow.as_deref() {
            Some(p) => AccessPattern::new(p),
            None => AccessPattern::exact_domain(own_domain),
        };
        pattern.map_err(|e| GlobalStoreError::Configuration(format!("allow: {e}")))
    }

    pub fn timeout(&self) -> Result<Duration> {
        if self.timeout_ms == 0 {
            return Err(GlobalStoreError::Configuration("timeout_ms must be positive".into()));
        }
        Ok(Duration::from_millis(self.timeout_ms))
    }
}
