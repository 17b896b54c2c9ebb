use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_core::AccessPattern;

use super::access::{decide, AccessCheck, Decision};
use crate::config::HubSection;

/// Hub-global policy runtime.
/// Construct once at startup, then share via Arc.
#[derive(Debug, Clone)]
pub struct HubPolicy {
    global: AccessPattern,
    allow_empty_origin: bool,
}

impl HubPolicy {
    pub fn new(global: AccessPattern, allow_empty_origin: bool) -> Self {
        Self {
            global,
            allow_empty_origin,
        }
    }

    pub fn from_config(section: &HubSection) -> Result<Self> {
        Ok(Self::new(section.pattern()?, section.allow_empty_origin))
    }

    pub fn global(&self) -> &AccessPattern {
        &self.global
    }

    pub fn allow_empty_origin(&self) -> bool {
        self.allow_empty_origin
    }

    pub fn decide(&self, check: &AccessCheck<'_>) -> Decision {
        decide(check, &self.global, self.allow_empty_origin)
    }

    /// Startup constraint on the embedding parent. Failure is fatal.
    pub fn check_parent(&self, parent_domain: Option<&str>) -> Result<()> {
        match parent_domain {
            None if self.allow_empty_origin => Ok(()),
            None => Err(GlobalStoreError::Configuration(
                "empty parent origin is not allowed by the hub; check hub.allow_empty_origin".into(),
            )),
            Some(d) if self.global.matches(d) => Ok(()),
            Some(d) => Err(GlobalStoreError::Configuration(format!(
                "parent origin {d} is not allowed by the hub; check hub.allow"
            ))),
        }
    }
}
