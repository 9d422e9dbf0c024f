//! Top-level facade crate for rpclink.
//!
//! Re-exports the core primitives and the client runtime so users can depend on a single crate.

pub mod core {
    pub use rpclink_core::*;
}

pub mod client {
    pub use rpclink_client::*;
}

pub use rpclink_client::RpcClient;
