//! Policy layer (access decisions).
//!
//! `access` is the pure per-operation decision; `engine` binds it to the
//! hub-global configuration and adds the startup check.

pub mod access;
pub mod engine;

pub use access::{decide, AccessCheck, Decision, DenyReason};
pub use engine::HubPolicy;
