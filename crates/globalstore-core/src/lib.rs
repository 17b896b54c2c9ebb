//! globalstore core: wire protocol, origin/pattern primitives, record codec,
//! error types, and the in-process transport shared by the hub and client.
//!
//! Nothing in here touches storage or makes access decisions. Those live in
//! `globalstore-hub`; the request/response engine lives in `globalstore-client`.
//!
//! Everything here parses input that arrives from another origin, so failures
//! are returned as [`GlobalStoreError`] values and never panic; the lints below
//! enforce that.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod origin;
pub mod pattern;
pub mod protocol;
pub mod record;
pub mod transport;

/// Shared result type.
pub use error::{ErrorCode, GlobalStoreError, Result};
pub use origin::{DomainExtractor, HeuristicExtractor};
pub use pattern::AccessPattern;
pub use record::Record;
