//! Hub protocol handling.
//!
//! Re-exports the hub and its listening handler so transports can depend on
//! this module directly.

pub mod handler;

pub use handler::{Hub, HubHandler};
