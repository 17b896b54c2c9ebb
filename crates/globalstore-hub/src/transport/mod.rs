//! Transports the hub can listen on.
//!
//! - `port`: in-process channel (`globalstore_core::transport`)
//! - `embed`: a client `Connector` that spawns a hub on such a channel
//! - `ws`: WebSocket upgrade handler for remote parents

pub mod embed;
pub mod port;
pub mod ws;
