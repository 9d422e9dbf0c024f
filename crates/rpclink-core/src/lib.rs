//! rpclink core: runtime-free protocol primitives, error types, and events.
//!
//! This crate defines the wire-level contracts (hybrid text + binary frames,
//! JSON-RPC envelopes, query results) and the publish/subscribe primitive
//! shared by the client runtime. It carries no socket or async runtime
//! dependencies so every codec can be tested without a live connection.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed server input surfaces as `RpcLinkError::Malformed` instead of
//! tearing down the session.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod event;
pub mod protocol;

/// Shared result type.
pub use error::{Result, RpcLinkError};
pub use event::{Event, Listener};
