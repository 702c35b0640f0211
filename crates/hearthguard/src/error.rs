//! Unified error type for Hearthguard.

use hearthguard_protocol::ProtocolError;
use hearthguard_session::SessionError;
use hearthguard_transport::SocketError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `hearthguard` crate you deal with this single error
/// type instead of importing errors from each layer. The `#[from]`
/// attributes generate `From` impls, so `?` converts automatically.
#[derive(Debug, thiserror::Error)]
pub enum HearthguardError {
    /// A transport-level error (connect, bind, send, receive).
    #[error(transparent)]
    Socket(#[from] SocketError),

    /// A protocol-level error (framing, encoding, decoding).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
