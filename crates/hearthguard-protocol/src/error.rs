//! Error types for the protocol layer.

use crate::frame::MAX_BODY_LEN;

/// Errors raised while framing, encoding or decoding packets.
///
/// Only [`InvalidVersion`](Self::InvalidVersion) is fatal for a
/// connection: it means the leading bytes of the receive buffer are not a
/// frame header, so frame boundaries can no longer be found. Every other
/// variant is scoped to the single frame that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The header's version bytes do not match [`PROTOCOL_VERSION`](crate::PROTOCOL_VERSION).
    #[error("invalid protocol version {found:02x?}")]
    InvalidVersion { found: [u8; 4] },

    /// The type tag is outside the packet union.
    #[error("invalid packet type {tag} (union has {count} variants)")]
    InvalidType { tag: u16, count: u16 },

    /// Fewer or more bytes than the layout requires.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A field held a value its type cannot represent.
    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u32 },

    /// The encoded body does not fit the 16-bit length field.
    #[error("packet body of {0} bytes exceeds the {max} byte limit", max = MAX_BODY_LEN)]
    BodyTooLarge(usize),
}

impl ProtocolError {
    /// `true` if the connection that produced this error has lost frame
    /// alignment and must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidVersion { .. })
    }
}
