//! globalstore hub library entry.
//!
//! The hub is the neutral context that owns the store. This crate wires the
//! config, access policy, store backends and the protocol handler together,
//! and exposes them over two transports: an in-process embedded channel
//! (used by clients in the same process and by tests) and a WebSocket server.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod ops;
pub mod policy;
pub mod router;
pub mod store;
pub mod transport;

pub use dispatch::{Hub, HubHandler};
pub use transport::embed::EmbeddedHub;
