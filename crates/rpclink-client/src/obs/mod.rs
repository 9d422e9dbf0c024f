//! Observability: in-process metrics and per-entrypoint call tracing.
//!
//! Metrics are stored as atomics in `DashMap`s and rendered in Prometheus
//! text format on demand. Tracing goes through `tracing` at `info` level for
//! the entrypoints selected by [`trace::TraceFilter`].

pub mod metrics;
pub mod trace;
