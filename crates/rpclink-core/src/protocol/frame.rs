//! Hybrid frame encoding/decoding (panic-free).
//!
//! Parsing rules:
//! - Never index (`buf[0]`); always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, RpcLinkError};

/// Size of the little-endian text length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// One decoded frame: JSON text plus an optional raw tail.
///
/// An empty `chunk` means the frame carried no tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// UTF-8 JSON text of the envelope.
    pub text: String,
    /// Raw binary tail (zero-copy slice of the received message).
    pub chunk: Bytes,
}

impl Frame {
    pub fn new(text: impl Into<String>, chunk: impl Into<Bytes>) -> Self {
        Self {
            text: text.into(),
            chunk: chunk.into(),
        }
    }

    /// Frame without a binary tail.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, Bytes::new())
    }

    /// Tail bytes, or `None` when the frame has no tail.
    pub fn chunk(&self) -> Option<&Bytes> {
        if self.chunk.is_empty() {
            None
        } else {
            Some(&self.chunk)
        }
    }

    /// Encode into the wire layout.
    pub fn encode(&self) -> Result<Bytes> {
        encode(&self.text, &self.chunk)
    }

    /// Decode from the wire layout.
    pub fn decode(buf: Bytes) -> Result<Self> {
        decode(buf)
    }
}

/// Encode JSON text and a raw tail into one frame.
pub fn encode(text: &str, chunk: &[u8]) -> Result<Bytes> {
    let text_len = u32::try_from(text.len()).map_err(|_| {
        RpcLinkError::Malformed(format!("frame text too long: {} bytes", text.len()))
    })?;

    let mut out = BytesMut::with_capacity(LENGTH_PREFIX_LEN + text.len() + chunk.len());
    out.put_u32_le(text_len);
    out.put_slice(text.as_bytes());
    out.put_slice(chunk);
    Ok(out.freeze())
}

/// Decode a frame from bytes.
pub fn decode(mut buf: Bytes) -> Result<Frame> {
    if buf.remaining() < LENGTH_PREFIX_LEN {
        return Err(RpcLinkError::Malformed("frame too short".into()));
    }

    let text_len = buf.get_u32_le() as usize;
    if buf.remaining() < text_len {
        return Err(RpcLinkError::Malformed(format!(
            "frame declares {text_len} text bytes but only {} remain",
            buf.remaining()
        )));
    }

    let text_bytes = buf.split_to(text_len);
    let text = String::from_utf8(text_bytes.to_vec())
        .map_err(|e| RpcLinkError::Malformed(format!("frame text is not utf-8: {e}")))?;

    // Remaining bytes are the tail.
    Ok(Frame { text, chunk: buf })
}
