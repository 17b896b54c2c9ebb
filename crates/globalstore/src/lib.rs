//! Top-level facade crate for globalstore.
//!
//! Re-exports the shared types, the hub and the client so users can depend on a single crate.

pub mod core {
    pub use globalstore_core::*;
}

pub mod hub {
    pub use globalstore_hub::*;
}

pub mod client {
    pub use globalstore_client::*;
}
