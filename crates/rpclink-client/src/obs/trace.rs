//! Selective tracing of calls by entrypoint name.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// Which entrypoints get `>>>` / `<<<` trace lines.
///
/// Deserializes from `false`, `true`, a single name, or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TraceFilter {
    All(bool),
    One(String),
    Many(Vec<String>),
}

impl Default for TraceFilter {
    fn default() -> Self {
        TraceFilter::All(false)
    }
}

impl TraceFilter {
    pub fn matches(&self, entrypoint: &str) -> bool {
        match self {
            TraceFilter::All(on) => *on,
            TraceFilter::One(name) => name == entrypoint,
            TraceFilter::Many(names) => names.iter().any(|n| n == entrypoint),
        }
    }

    pub fn outgoing(&self, id: &str, entrypoint: &str, params: Option<&Value>) {
        if !self.matches(entrypoint) {
            return;
        }
        let params = params.map(Value::to_string).unwrap_or_default();
        tracing::info!(target: "rpclink::trace", %id, entrypoint, %params, ">>>");
    }

    pub fn incoming(&self, id: &str, entrypoint: &str, elapsed: Duration, success: bool) {
        if !self.matches(entrypoint) {
            return;
        }
        tracing::info!(
            target: "rpclink::trace",
            %id,
            entrypoint,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            success,
            "<<<"
        );
    }

    pub fn update(&self, name: &str, value: &Value) {
        if !self.matches(name) {
            return;
        }
        tracing::info!(target: "rpclink::trace", name, %value, "<event>");
    }
}
