//! Wire protocol for Hearthguard.
//!
//! This crate defines the bytes that clients and servers exchange:
//!
//! - **Framing** ([`encode_frame`], [`try_take_frame`]) — every packet is
//!   one length-prefixed frame with a fixed 8-byte header.
//! - **Serialization** ([`WireFormat`]) — field-by-field little-endian
//!   layouts for every payload and data shape.
//! - **Packets** ([`ClientPacket`], [`ServerPacket`]) — the two closed
//!   unions of messages, one per direction, and the [`Packet`] trait that
//!   ties a union to its type tags.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while framing or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (who is connected). It knows nothing about sockets: it turns a packet
//! into a frame, and turns the front of a receive buffer back into a
//! packet once a whole frame has arrived.
//!
//! ```text
//! Transport (bytes) → Protocol (frames, packets) → Session (peers)
//! ```
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use hearthguard_protocol::{
//!     encode_packet, take_packet, ClientPacket, Direction, PlayerMoveRequest,
//! };
//!
//! let packet = ClientPacket::from(PlayerMoveRequest { direction: Direction::Up });
//! let frame = encode_packet(&packet).unwrap();
//!
//! let mut buf = BytesMut::from(&frame[..]);
//! let decoded: Option<ClientPacket> = take_packet(&mut buf).unwrap();
//! assert_eq!(decoded, Some(packet));
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod frame;
mod messages;
mod packet;
mod types;
pub mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::ProtocolError;
pub use frame::{
    decode_header, encode_frame, encode_header, try_take_frame, Frame, FrameHeader,
    HEADER_LEN, MAX_BODY_LEN, PROTOCOL_VERSION,
};
pub use messages::{
    BaseHitResponse, EnemyUpdateResponse, FireballShotRequest, GameOverResponse,
    GameReadyRequest, GameReadyResponse, JoinLobbyRequest, JoinLobbyResponse,
    LobbyReadyRequest, LobbyReadyResponse, PlayerMoveRequest, PlayerMoveResponse,
    StartGameResponse, UpdateFireballsResponse,
};
pub use packet::{decode_packet, encode_packet, take_packet, ClientPacket, Packet, ServerPacket};
pub use types::{
    Direction, EnemyState, FireballState, MapData, TileKind, Vec2, MAP_HEIGHT, MAP_TILES,
    MAP_WIDTH, TILE_SIZE,
};
pub use wire::WireFormat;
