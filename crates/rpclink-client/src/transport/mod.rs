//! Transport layer (WebSocket client).
//!
//! Exposes the connection manager that owns the socket and the codec that
//! maps native WebSocket messages to/from hybrid frames.

pub mod codec;
pub mod connection;

pub use connection::{Connection, ConnectSettings, InboundHandler, SessionLink};
