//! # Hearthguard
//!
//! Packet transport and session layer for a small two-player base-defence
//! game, plus the pieces a binary needs around it.
//!
//! The server is authoritative: clients send requests, the server answers
//! with the resulting state. Everything runs on one thread, polled once
//! per tick by a fixed-timestep loop.
//!
//! ## Layers
//!
//! | crate | role |
//! |---|---|
//! | [`transport`] | non-blocking sockets with receive buffers |
//! | [`protocol`] | frame codec, packet unions, field encoding |
//! | [`session`] | client/server sessions speaking in packets |
//! | [`tick`] | fixed-timestep, cancellable tick loop |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearthguard::prelude::*;
//!
//! # fn main() -> Result<(), HearthguardError> {
//! let config = NetConfig::default();
//! let mut server = ServerSession::bind(&config.address, config.port)?;
//! server.wait_for_exactly(config.expected_players)?;
//!
//! while let Some((peer, packet)) = server.poll_message() {
//!     if let ClientPacket::JoinLobby(_) = packet {
//!         server.broadcast(JoinLobbyResponse {
//!             player_id: peer.into_inner(),
//!             connected_players: server.peer_count() as u8,
//!         })?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod logging;

pub use config::{ConfigError, NetConfig};
pub use error::HearthguardError;
pub use logging::init_logging;

pub use hearthguard_protocol as protocol;
pub use hearthguard_session as session;
pub use hearthguard_tick as tick;
pub use hearthguard_transport as transport;

/// Everything a game binary usually needs.
pub mod prelude {
    pub use crate::{init_logging, ConfigError, HearthguardError, NetConfig};

    pub use hearthguard_protocol::{
        BaseHitResponse, ClientPacket, Direction, EnemyState, EnemyUpdateResponse,
        FireballShotRequest, FireballState, GameOverResponse, GameReadyRequest,
        GameReadyResponse, JoinLobbyRequest, JoinLobbyResponse, LobbyReadyRequest,
        LobbyReadyResponse, MapData, Packet, PlayerMoveRequest, PlayerMoveResponse,
        ProtocolError, ServerPacket, StartGameResponse, TileKind, UpdateFireballsResponse,
        Vec2, MAP_HEIGHT, MAP_WIDTH, TILE_SIZE,
    };
    pub use hearthguard_session::{ClientSession, ServerSession, SessionError};
    pub use hearthguard_tick::{TickConfig, TickInfo, TickMetrics, TickScheduler};
    pub use hearthguard_transport::{PeerId, SocketError};
    pub use tokio_util::sync::CancellationToken;
}
