//! Error types for the session layer.

use hearthguard_protocol::ProtocolError;
use hearthguard_transport::{PeerId, SocketError};

/// Errors that can occur while sending or polling through a session.
///
/// Lower-layer errors pass through unchanged, so callers can still match
/// on [`SocketError::WouldBlock`] to decide whether to retry a send on the
/// next tick.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The socket layer failed (connect, bind, send, receive).
    #[error(transparent)]
    Socket(#[from] SocketError),

    /// A packet could not be framed or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No connected peer has this id. It may have been removed after a
    /// disconnect.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
}

impl SessionError {
    /// `true` if a send could not make progress and may be retried.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Socket(e) if e.is_would_block())
    }

    /// `true` if the connection behind the session is gone.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Socket(e) => e.is_disconnect(),
            Self::Protocol(e) => e.is_fatal(),
            Self::UnknownPeer(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_socket_error() {
        let err: SessionError = SocketError::WouldBlock.into();
        assert!(err.is_would_block());
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_fatal_protocol_error_is_disconnect() {
        let err: SessionError = ProtocolError::InvalidVersion { found: [1, 2, 3, 4] }.into();
        assert!(err.is_disconnect());

        let err: SessionError = ProtocolError::InvalidType { tag: 7, count: 5 }.into();
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_unknown_peer_display() {
        let err = SessionError::UnknownPeer(PeerId::new(3));
        assert_eq!(err.to_string(), "unknown peer peer-3");
    }
}
