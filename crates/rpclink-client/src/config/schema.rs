use std::time::Duration;

use serde::Deserialize;
use rpclink_core::error::{Result, RpcLinkError};

use crate::obs::trace::TraceFilter;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub client: ClientSection,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RpcLinkError::UnsupportedVersion);
        }

        self.client.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    /// WebSocket address of the service (`ws://` or `wss://`).
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Entrypoints whose calls are logged (`false`, `true`, a name, or a list).
    #[serde(default)]
    pub trace: TraceFilter,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            trace: TraceFilter::default(),
        }
    }
}

impl ClientSection {
    /// Defaults pointed at `address`.
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.address.starts_with("ws://") || self.address.starts_with("wss://")) {
            return Err(RpcLinkError::Config(format!(
                "client.address must start with ws:// or wss:// (got {:?})",
                self.address
            )));
        }
        if !(1..=50).contains(&self.connect_attempts) {
            return Err(RpcLinkError::Config(
                "client.connect_attempts must be between 1 and 50".into(),
            ));
        }
        if self.retry_delay_ms > 60_000 {
            return Err(RpcLinkError::Config(
                "client.retry_delay_ms must be at most 60000".into(),
            ));
        }
        if !(100..=120_000).contains(&self.connect_timeout_ms) {
            return Err(RpcLinkError::Config(
                "client.connect_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_address() -> String {
    "ws://localhost:5000".into()
}
fn default_connect_attempts() -> u32 {
    5
}
fn default_retry_delay_ms() -> u64 {
    300
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
