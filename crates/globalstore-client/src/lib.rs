//! globalstore client engine.
//!
//! Runs in the requesting context: creates the hub's child context once,
//! waits for its readiness signal, then issues correlated requests with a
//! per-request deadline. Each [`GlobalStorage`] owns its own state and
//! correlation map; independent clients in one process do not share anything.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod options;

pub use client::{ClientState, GlobalStorage};
pub use options::{ClientOptions, DEFAULT_HUB_URL, DEFAULT_TIMEOUT_MS};
