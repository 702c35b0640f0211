//! Byte-stream transport for Hearthguard.
//!
//! Provides [`Socket`], an exclusively owned TCP endpoint with an explicit
//! lifecycle (create → connect/listen → send/receive → shutdown) and a
//! per-socket accumulation buffer for bytes that have arrived but do not
//! yet form a complete frame.
//!
//! Everything here is synchronous. Sockets are normally switched to
//! non-blocking mode, and [`SocketError::WouldBlock`] is the universal
//! "try again next tick" signal.

mod error;
mod socket;

pub use error::SocketError;
pub use socket::{Socket, SocketOptions};

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counter for handing out peer identifiers.
static NEXT_PEER_ID: AtomicU32 = AtomicU32::new(1);

/// Identifier of one socket, stable for the lifetime of its connection.
///
/// The server reuses it as the lobby/player identifier it sends to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u32);

impl PeerId {
    /// Creates a `PeerId` from a raw value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    pub fn into_inner(self) -> u32 {
        self.0
    }

    pub(crate) fn next() -> Self {
        Self(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_new_and_into_inner() {
        let id = PeerId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_peer_id_display() {
        assert_eq!(PeerId::new(7).to_string(), "peer-7");
    }

    #[test]
    fn test_peer_id_next_is_unique() {
        let a = PeerId::next();
        let b = PeerId::next();
        assert_ne!(a, b);
    }
}
