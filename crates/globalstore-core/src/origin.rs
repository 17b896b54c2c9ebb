//! Origin -> registrable domain reduction.
//!
//! Access patterns are matched against the *registrable domain* of a sender,
//! not against its full origin. The default extractor is a heuristic regex that
//! approximates the public-suffix list; it mis-classifies multi-part suffixes
//! such as `co.uk`. Swap in another [`DomainExtractor`] to fix that without
//! touching the protocol.

use regex::Regex;
use url::Url;

use crate::error::{GlobalStoreError, Result};

/// Literal host that bypasses extraction.
pub const LOCALHOST: &str = "localhost";

/// Heuristic: last label plus its immediate parent label(s).
pub const HEURISTIC_DOMAIN_RE: &str = r"[^.]*(\.[^.]{2,4}(?:\.[^.]{2,3})?$|\.[^.]{2,8}$)";

/// Reduces a host name to the domain access patterns are matched against.
pub trait DomainExtractor: Send + Sync {
    /// Returns `None` when no domain can be extracted from `host`.
    fn extract(&self, host: &str) -> Option<String>;
}

/// Regex-based extractor (see [`HEURISTIC_DOMAIN_RE`]).
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    re: Regex,
}

impl HeuristicExtractor {
    pub fn new() -> Result<Self> {
        let re = Regex::new(HEURISTIC_DOMAIN_RE)
            .map_err(|e| GlobalStoreError::Internal(format!("domain regex: {e}")))?;
        Ok(Self { re })
    }
}

impl DomainExtractor for HeuristicExtractor {
    fn extract(&self, host: &str) -> Option<String> {
        self.re.find(host).map(|m| m.as_str().to_string())
    }
}

/// Registrable domain for a bare host. `localhost` maps to itself.
pub fn registrable_domain(host: &str, extractor: &dyn DomainExtractor) -> Option<String> {
    if host == LOCALHOST {
        return Some(LOCALHOST.to_string());
    }
    extractor.extract(host)
}

/// `true` for the origins a sandboxed or file-backed context reports.
pub fn is_undefined(origin: Option<&str>) -> bool {
    matches!(origin, None | Some("") | Some("null"))
}

/// Host part of an origin string. Scheme-less input is read as `https://`.
pub fn host_of(origin: &str) -> Option<String> {
    let url = match Url::parse(origin) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{origin}")).ok()?
        }
        Err(_) => return None,
    };
    match url.host_str() {
        Some(h) if !h.is_empty() => Some(h.to_string()),
        _ => None,
    }
}

/// Reduce a sender origin to its registrable domain.
///
/// Undefined origins (`None`, `""`, `"null"`) yield `Ok(None)`. A defined
/// origin with no usable host or domain is a `BadRequest`.
pub fn domain_of(origin: Option<&str>, extractor: &dyn DomainExtractor) -> Result<Option<String>> {
    let Some(origin) = origin.filter(|o| !is_undefined(Some(o))) else {
        return Ok(None);
    };
    let host = host_of(origin)
        .ok_or_else(|| GlobalStoreError::BadRequest(format!("origin has no host: {origin}")))?;
    registrable_domain(&host, extractor)
        .map(Some)
        .ok_or_else(|| GlobalStoreError::BadRequest(format!("cannot derive domain from host: {host}")))
}

/// Serialized origin (`scheme://host[:port]`) of a URL.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
