use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Deserialize;
use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_core::pattern::{AccessPattern, MATCH_ALL};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    pub version: u32,

    #[serde(default)]
    pub hub: HubSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,
}

impl HubConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GlobalStoreError::Configuration(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.hub.validate()?;
        self.server.validate()?;

        Ok(())
    }
}

/// Hub-global access policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    /// Pattern every caller's registrable domain must match.
    #[serde(default = "default_allow")]
    pub allow: String,

    /// Accept callers that report no origin at all (file:// pages, sandboxes).
    #[serde(default)]
    pub allow_empty_origin: bool,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            allow: default_allow(),
            allow_empty_origin: false,
        }
    }
}

impl HubSection {
    pub fn validate(&self) -> Result<()> {
        self.pattern().map(|_| ())
    }

    pub fn pattern(&self) -> Result<AccessPattern> {
        AccessPattern::new(self.allow.as_str())
            .map_err(|e| GlobalStoreError::Configuration(format!("hub.allow: {e}")))
    }
}

fn default_allow() -> String {
    MATCH_ALL.into()
}

const PING_RANGE_MS: RangeInclusive<u64> = 5_000..=120_000;
const IDLE_RANGE_MS: RangeInclusive<u64> = 10_000..=600_000;

/// WebSocket endpoint of the hub binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerSection {
    pub listen: String,
    /// Server ping cadence on idle sessions.
    pub ping_interval_ms: u64,
    /// Sessions with no inbound frame for this long are closed.
    pub idle_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            ping_interval_ms: 20_000,
            idle_timeout_ms: 60_000,
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        in_range("server.ping_interval_ms", self.ping_interval_ms, &PING_RANGE_MS)?;
        in_range("server.idle_timeout_ms", self.idle_timeout_ms, &IDLE_RANGE_MS)?;
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(GlobalStoreError::Configuration(format!(
                "server.idle_timeout_ms ({}) must exceed server.ping_interval_ms ({})",
                self.idle_timeout_ms, self.ping_interval_ms
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            GlobalStoreError::Configuration(format!("server.listen {:?}: {e}", self.listen))
        })
    }

    /// `(ping interval, idle timeout)` for a hub session.
    pub fn keepalive(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.ping_interval_ms),
            Duration::from_millis(self.idle_timeout_ms),
        )
    }
}

fn in_range(field: &str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(GlobalStoreError::Configuration(format!(
        "{field} = {value} is outside {}..={}",
        range.start(),
        range.end()
    )))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// JSON file backing the store. In-memory when absent.
    #[serde(default)]
    pub path: Option<String>,
}
