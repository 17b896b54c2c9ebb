//! Access patterns: regex sources matched against registrable domains.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GlobalStoreError, Result};

/// Source of the default hub pattern.
pub const MATCH_ALL: &str = ".*";

/// A compiled access pattern. Matching is an unanchored search; authors anchor
/// explicitly (`example\.com$`).
#[derive(Clone)]
pub struct AccessPattern {
    source: String,
    matcher: Matcher,
}

#[derive(Clone)]
enum Matcher {
    All,
    Re(Regex),
}

impl AccessPattern {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source == MATCH_ALL {
            return Ok(Self::match_all());
        }
        let re = Regex::new(&source)
            .map_err(|e| GlobalStoreError::BadRequest(format!("invalid access pattern {source:?}: {e}")))?;
        Ok(Self { source, matcher: Matcher::Re(re) })
    }

    /// Pattern admitting every origin.
    pub fn match_all() -> Self {
        Self {
            source: MATCH_ALL.to_string(),
            matcher: Matcher::All,
        }
    }

    /// Pattern admitting exactly `domain` (escaped, anchored both ends).
    pub fn exact_domain(domain: &str) -> Result<Self> {
        Self::new(format!("^{}$", regex::escape(domain)))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, domain: &str) -> bool {
        match &self.matcher {
            Matcher::All => true,
            Matcher::Re(re) => re.is_match(domain),
        }
    }
}

impl fmt::Debug for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessPattern").field(&self.source).finish()
    }
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for AccessPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for AccessPattern {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for AccessPattern {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        AccessPattern::new(s).map_err(serde::de::Error::custom)
    }
}
