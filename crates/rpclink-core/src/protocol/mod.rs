//! Protocol modules (frame codec + JSON-RPC envelopes).
//!
//! This module hosts the hybrid wire format:
//! - Frame: `[u32 LE text length][UTF-8 JSON][raw binary tail]`.
//! - Envelope: the JSON-RPC object carried by a frame (call, response, or
//!   spontaneous update).
//! - Result: the typed outcome of one call.
//!
//! All parsers are panic-free: malformed input is reported as
//! `RpcLinkError::Malformed` instead of panicking or indexing raw buffers, so
//! one corrupt frame never takes down a session.

pub mod envelope;
pub mod frame;
pub mod result;

pub use envelope::{Envelope, ErrorObject, Incoming, Update};
pub use frame::Frame;
pub use result::{Outcome, QueryFailure, QueryResult, QuerySuccess};
