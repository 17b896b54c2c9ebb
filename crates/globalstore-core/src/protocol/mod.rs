//! Wire protocol between the client engine and the hub.
//!
//! Requests and replies are JSON objects; readiness is a bare JSON string
//! sentinel. Parsers never panic: anything that does not fit the expected
//! shape is rejected as a value, and the hub drops it.

pub mod message;

pub use message::{Inbound, Method, Reply, Request, CLEAR_KEY, CONNECT_ID, READY_SENTINEL, REQUEST_ID_PREFIX};
