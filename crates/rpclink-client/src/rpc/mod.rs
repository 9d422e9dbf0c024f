//! Calls: correlation table, long tasks and the public client.

pub mod client;
pub mod long_task;
pub mod tracker;
pub mod types;

pub use client::RpcClient;
pub use long_task::{CancelHandle, LongTask};
pub use tracker::{RequestTracker, SettleHook, Settled, Settlement};
pub use types::{Progress, Reply};
