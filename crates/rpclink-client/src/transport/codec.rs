//! Decode-once codec between WebSocket messages and envelopes.
//!
//! - Text messages => bare envelope JSON (no tail)
//! - Binary messages => hybrid frame (panic-free `bytes::Buf` parsing)
//! - Ping/Pong/Close are surfaced for lifecycle management

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

use rpclink_core::{error::Result, protocol::frame};

#[derive(Debug)]
pub enum Inbound {
    /// Envelope text plus the binary tail, if any.
    Envelope { text: String, chunk: Option<Bytes> },
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
    /// Raw frame surfaced by the socket; carries no envelope.
    Raw,
}

pub fn decode(msg: Message) -> Result<Inbound> {
    match msg {
        Message::Text(text) => Ok(Inbound::Envelope { text, chunk: None }),
        Message::Binary(b) => {
            let f = frame::decode(Bytes::from(b))?;
            let chunk = if f.chunk.is_empty() { None } else { Some(f.chunk) };
            Ok(Inbound::Envelope { text: f.text, chunk })
        }
        Message::Ping(v) => Ok(Inbound::Ping(v)),
        Message::Pong(v) => Ok(Inbound::Pong(v)),
        Message::Close(_) => Ok(Inbound::Close),
        Message::Frame(_) => Ok(Inbound::Raw),
    }
}

/// Wrap envelope JSON (and an optional tail) into a binary message.
pub fn encode(text: &str, chunk: Option<&[u8]>) -> Result<Message> {
    let bytes = frame::encode(text, chunk.unwrap_or_default())?;
    Ok(Message::Binary(bytes.to_vec()))
}
