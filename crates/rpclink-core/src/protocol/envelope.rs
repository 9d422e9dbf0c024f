//! JSON-RPC envelopes (inbound schema + outbound builders).
//!
//! Inbound text is validated once, here, by serde: anything that does not
//! fit the schema becomes `RpcLinkError::Malformed` before it reaches typed
//! code. Unknown top-level fields are tolerated since servers add their own
//! (`jsonrpc`, tracing ids, ...).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RpcLinkError};
use crate::protocol::result::{Outcome, MISSING_ERROR_CODE, MISSING_ERROR_MESSAGE};

/// Protocol version tag written on every outgoing envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Control method asking the server to abort a long task.
pub const CANCEL_METHOD: &str = "cancel";

/// Inbound envelope (response or spontaneous update).
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Correlation id; absent, `null` or empty on spontaneous updates.
    #[serde(default)]
    pub id: Option<String>,
    /// Event name of a spontaneous update.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

/// `error` member of a response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Only a string array is meaningful; anything else is discarded.
    #[serde(default)]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// `data` when it is an array of strings.
    pub fn string_data(&self) -> Option<Vec<String>> {
        let items = self.data.as_ref()?.as_array()?;
        items
            .iter()
            .map(|v| v.as_str().map(str::to_owned))
            .collect()
    }

    /// Convert into a failure outcome, filling the sentinel defaults.
    pub fn into_outcome(self) -> Outcome {
        let data = self.string_data();
        Outcome::Failure {
            code: self.code.unwrap_or(MISSING_ERROR_CODE),
            message: self
                .message
                .unwrap_or_else(|| MISSING_ERROR_MESSAGE.to_string()),
            data,
        }
    }
}

/// Server-pushed message that answers no call.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Event name (`method` of the envelope).
    pub name: String,
    /// Payload (`params` of the envelope, `null` when absent).
    pub value: Value,
}

/// Classified inbound envelope.
#[derive(Debug)]
pub enum Incoming {
    /// Answer to the call identified by `id`.
    Response { id: String, outcome: Outcome },
    /// Spontaneous update.
    Update(Update),
}

impl Envelope {
    /// Parse and validate envelope JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| RpcLinkError::Malformed(format!("invalid envelope: {e}")))
    }

    /// Correlation id, if this envelope is a response.
    pub fn response_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Classify into a response or a spontaneous update.
    ///
    /// A non-empty `chunk` is attached to a successful response when its
    /// `result` is a JSON object; otherwise the tail is dropped.
    pub fn classify(self, chunk: Option<Bytes>) -> Result<Incoming> {
        let Some(id) = self.response_id().map(str::to_owned) else {
            let name = self.method.ok_or_else(|| {
                RpcLinkError::Malformed("update without id must carry a method".into())
            })?;
            return Ok(Incoming::Update(Update {
                name,
                value: self.params.unwrap_or(Value::Null),
            }));
        };

        if let Some(error) = self.error {
            return Ok(Incoming::Response {
                id,
                outcome: error.into_outcome(),
            });
        }

        let result = self.result.unwrap_or(Value::Null);
        let data = match chunk.filter(|c| !c.is_empty()) {
            Some(c) if result.is_object() => Some(c),
            Some(c) => {
                tracing::warn!(
                    %id,
                    chunk_len = c.len(),
                    "binary tail dropped: result is not an object"
                );
                None
            }
            None => None,
        };

        Ok(Incoming::Response {
            id,
            outcome: Outcome::Success { result, data },
        })
    }
}

/// Outgoing call envelope.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: &'a str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

impl<'a> Request<'a> {
    pub fn new(id: &'a str, method: &'a str, params: Option<&'a Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RpcLinkError::Transport(format!("json encode failed: {e}")))
    }
}

/// Outgoing envelope without an id; never answered.
#[derive(Debug, Serialize)]
pub struct Notification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> Notification<'a> {
    /// `{"jsonrpc":"2.0","method":"cancel","params":{"id":<id>}}`
    pub fn cancel(id: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: CANCEL_METHOD,
            params: serde_json::json!({ "id": id }),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RpcLinkError::Transport(format!("json encode failed: {e}")))
    }
}
