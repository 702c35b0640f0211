use std::io;

/// Errors that can occur on a [`Socket`](crate::Socket).
///
/// Only [`Disconnected`](Self::Disconnected) and
/// [`PartialWrite`](Self::PartialWrite) mean the connection is gone for
/// good. [`WouldBlock`](Self::WouldBlock) is not a failure at all, just
/// "nothing can happen right now".
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// The address string could not be parsed as an IP literal.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The OS refused to allocate or use the endpoint.
    #[error("no access: {0}")]
    NoAccess(#[source] io::Error),

    /// The socket handle is closed or was never opened for this operation.
    #[error("invalid socket descriptor")]
    InvalidDescriptor,

    /// The operation needs a connected stream.
    #[error("socket is not connected")]
    NotConnected,

    /// The non-blocking operation cannot make progress right now.
    #[error("operation would block")]
    WouldBlock,

    /// The remote peer closed the connection.
    #[error("peer disconnected")]
    Disconnected,

    /// A write stalled part way through a frame. The stream can no longer
    /// be parsed by the peer.
    #[error("write stalled after {written} of {total} bytes")]
    PartialWrite { written: usize, total: usize },

    /// Any other OS error.
    #[error("socket error: {0}")]
    Unknown(#[source] io::Error),
}

impl SocketError {
    /// `true` for the "try again next tick" outcome.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /// `true` if the connection is unusable and the peer should be dropped.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::PartialWrite { .. })
    }
}

impl From<io::Error> for SocketError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock => Self::WouldBlock,
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => Self::Disconnected,
            io::ErrorKind::PermissionDenied => Self::NoAccess(e),
            io::ErrorKind::NotConnected => Self::NotConnected,
            io::ErrorKind::AddrNotAvailable => {
                Self::InvalidAddress(e.to_string())
            }
            _ => Self::Unknown(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_kind(kind: io::ErrorKind) -> SocketError {
        io::Error::new(kind, "test").into()
    }

    #[test]
    fn test_from_io_broken_pipe_is_disconnected() {
        assert!(matches!(
            from_kind(io::ErrorKind::BrokenPipe),
            SocketError::Disconnected
        ));
        assert!(matches!(
            from_kind(io::ErrorKind::ConnectionReset),
            SocketError::Disconnected
        ));
    }

    #[test]
    fn test_from_io_would_block() {
        let err = from_kind(io::ErrorKind::WouldBlock);
        assert!(err.is_would_block());
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_from_io_permission_denied_is_no_access() {
        assert!(matches!(
            from_kind(io::ErrorKind::PermissionDenied),
            SocketError::NoAccess(_)
        ));
    }

    #[test]
    fn test_from_io_other_is_unknown() {
        assert!(matches!(
            from_kind(io::ErrorKind::TimedOut),
            SocketError::Unknown(_)
        ));
    }

    #[test]
    fn test_partial_write_counts_as_disconnect() {
        let err = SocketError::PartialWrite { written: 3, total: 10 };
        assert!(err.is_disconnect());
        assert!(err.to_string().contains("3 of 10"));
    }
}
