//! Inbound dispatch.
//!
//! Re-exports the router so the connection can be wired to it directly.

pub mod router;

pub use router::{Routed, Router};
