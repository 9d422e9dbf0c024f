//! Shared error type across rpclink crates.

use thiserror::Error;

/// Stable error codes, independent of the error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No open session to send on.
    NotConnected,
    /// Serialization or socket write failure.
    Transport,
    /// Connect retry budget exhausted.
    ConnectFailed,
    /// Session dropped while the call was pending.
    ConnectionClosed,
    /// The server answered with an error envelope.
    Rpc,
    /// Frame or envelope failed validation.
    Malformed,
    /// Invalid configuration.
    Config,
    /// Unsupported configuration version.
    UnsupportedVersion,
}

impl ErrorCode {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::ConnectFailed => "CONNECT_FAILED",
            ErrorCode::ConnectionClosed => "CONNECTION_CLOSED",
            ErrorCode::Rpc => "RPC",
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::Config => "CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RpcLinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Clone, Error)]
pub enum RpcLinkError {
    #[error("not connected")]
    NotConnected,
    #[error("transport: {0}")]
    Transport(String),
    #[error("unable to connect to \"{address}\" after {attempts} attempt(s): {reason}")]
    ConnectFailed {
        address: String,
        attempts: u32,
        reason: String,
    },
    #[error("connection closed before a response arrived")]
    ConnectionClosed,
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Vec<String>>,
    },
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
}

impl RpcLinkError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RpcLinkError::NotConnected => ErrorCode::NotConnected,
            RpcLinkError::Transport(_) => ErrorCode::Transport,
            RpcLinkError::ConnectFailed { .. } => ErrorCode::ConnectFailed,
            RpcLinkError::ConnectionClosed => ErrorCode::ConnectionClosed,
            RpcLinkError::Rpc { .. } => ErrorCode::Rpc,
            RpcLinkError::Malformed(_) => ErrorCode::Malformed,
            RpcLinkError::Config(_) => ErrorCode::Config,
            RpcLinkError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
        }
    }

    /// Server-side error code, for `Rpc` errors only.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            RpcLinkError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}
