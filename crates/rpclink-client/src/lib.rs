//! rpclink client library entry.
//!
//! This crate wires the connection manager, the inbound router, the request
//! tracker and long tasks into one [`RpcClient`]. It is intended to be
//! consumed by applications, by the binary (`main.rs`) and by integration
//! tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod dispatch;
pub mod obs;
pub mod rpc;
pub mod transport;

pub use rpc::{CancelHandle, LongTask, Progress, Reply, RpcClient};
