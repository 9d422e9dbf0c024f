//! Typed outcome of one call.

use bytes::Bytes;
use serde_json::Value;

use crate::error::RpcLinkError;

/// Error code used when the server omits one.
pub const MISSING_ERROR_CODE: i64 = 666;

/// Error message used when the server omits one.
pub const MISSING_ERROR_MESSAGE: &str = "Unknown error!";

/// What the server said, before it is matched with its call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        result: Value,
        /// Out-of-band binary attachment (e.g. an image buffer).
        data: Option<Bytes>,
    },
    Failure {
        code: i64,
        message: String,
        data: Option<Vec<String>>,
    },
}

/// Successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySuccess {
    pub entrypoint: String,
    pub param: Value,
    pub result: Value,
    pub data: Option<Bytes>,
}

/// Call the server answered with an error envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFailure {
    pub entrypoint: String,
    pub param: Value,
    pub code: i64,
    pub message: String,
    pub data: Option<Vec<String>>,
}

/// Tagged result returned by `try_to_exec`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Success(QuerySuccess),
    Failure(QueryFailure),
}

impl QueryResult {
    /// Match an outcome with the call it answers.
    pub fn from_outcome(entrypoint: impl Into<String>, param: Value, outcome: Outcome) -> Self {
        let entrypoint = entrypoint.into();
        match outcome {
            Outcome::Success { result, data } => QueryResult::Success(QuerySuccess {
                entrypoint,
                param,
                result,
                data,
            }),
            Outcome::Failure {
                code,
                message,
                data,
            } => QueryResult::Failure(QueryFailure {
                entrypoint,
                param,
                code,
                message,
                data,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, QueryResult::Failure(_))
    }

    pub fn entrypoint(&self) -> &str {
        match self {
            QueryResult::Success(s) => &s.entrypoint,
            QueryResult::Failure(f) => &f.entrypoint,
        }
    }

    /// Turn an RPC failure into `RpcLinkError::Rpc`.
    pub fn into_result(self) -> std::result::Result<QuerySuccess, RpcLinkError> {
        match self {
            QueryResult::Success(s) => Ok(s),
            QueryResult::Failure(f) => Err(f.into()),
        }
    }
}

impl From<QueryFailure> for RpcLinkError {
    fn from(f: QueryFailure) -> Self {
        RpcLinkError::Rpc {
            code: f.code,
            message: f.message,
            data: f.data,
        }
    }
}
