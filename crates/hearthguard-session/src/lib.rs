//! Client and server sessions for Hearthguard.
//!
//! A session owns socket(s) and speaks in packets instead of bytes:
//!
//! - [`ClientSession`] — one connection to the server. Sends
//!   [`ClientPacket`](hearthguard_protocol::ClientPacket)s, polls
//!   [`ServerPacket`](hearthguard_protocol::ServerPacket)s.
//! - [`ServerSession`] — a listener plus the registry of connected peers.
//!   Accepts, broadcasts, targets single peers, and polls packets tagged
//!   with the [`PeerId`](hearthguard_transport::PeerId) they came from.
//!
//! # How it fits in the stack
//!
//! ```text
//! Game loop (above)  ← calls poll/send once per tick
//!     ↕
//! Session Layer (this crate)  ← peers, typed send/poll, disconnect handling
//!     ↕
//! Protocol Layer (below)  ← frames and packet encoding
//!     ↕
//! Transport Layer  ← non-blocking sockets
//! ```
//!
//! Nothing here spawns threads or tasks. Both sessions are meant to be
//! driven from a single loop; "would block" just means "nothing yet,
//! try again next tick".

mod client;
mod error;
mod server;

pub use client::ClientSession;
pub use error::SessionError;
pub use server::ServerSession;
