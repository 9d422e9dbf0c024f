use bytes::Bytes;
use serde_json::Value;

use rpclink_core::protocol::Update;

const DEFAULT_PROGRESS_LABEL: &str = "Loading...";
pub(crate) const CANCELLATION_LABEL: &str = "Cancellation...";

/// Progress of a long task.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Completion in `0..=1`.
    pub value: f64,
    pub label: String,
}

impl Progress {
    pub fn new(value: f64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }

    /// Progress for task `id`, if `update` reports on it.
    ///
    /// Only `params.id` is matched. `amount` defaults to 0 and `operation`
    /// to `"Loading..."` when missing or of the wrong type.
    pub fn from_update(id: &str, update: &Update) -> Option<Self> {
        let params = update.value.as_object()?;
        if params.get("id").and_then(Value::as_str) != Some(id) {
            return None;
        }
        Some(Self {
            value: params.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
            label: params
                .get("operation")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROGRESS_LABEL)
                .to_string(),
        })
    }
}

/// Successful answer with its binary tail.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub result: Value,
    pub data: Option<Bytes>,
}
