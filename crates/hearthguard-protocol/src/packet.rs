//! The two packet unions and the encode/decode entry points.
//!
//! A packet's type tag is its variant's position in the union. The
//! per-direction unions are closed: adding a message means adding a
//! variant at the end and a `match` arm in each table below.

use bytes::{Bytes, BytesMut};

use crate::frame::{encode_header, try_take_frame, Frame, HEADER_LEN};
use crate::messages::{
    BaseHitResponse, EnemyUpdateResponse, FireballShotRequest, GameOverResponse,
    GameReadyRequest, GameReadyResponse, JoinLobbyRequest, JoinLobbyResponse,
    LobbyReadyRequest, LobbyReadyResponse, PlayerMoveRequest, PlayerMoveResponse,
    StartGameResponse, UpdateFireballsResponse,
};
use crate::wire::{decode_body, encode_body};
use crate::ProtocolError;

/// A closed union of messages that can be sent as frames.
pub trait Packet: Sized {
    /// Number of variants; valid tags are `0..VARIANT_COUNT`.
    const VARIANT_COUNT: u16;

    /// Ordinal of the active variant.
    fn tag(&self) -> u16;

    /// Variant name for logs.
    fn name(&self) -> &'static str;

    /// Appends the active variant's body.
    fn encode_body(&self, dst: &mut BytesMut);

    /// Decodes the body of the variant identified by `tag`.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidType`] for an unknown tag, or any body
    /// decoding error.
    fn decode_body(tag: u16, body: &[u8]) -> Result<Self, ProtocolError>;
}

/// Serializes `packet` and wraps it in a frame.
///
/// # Errors
/// [`ProtocolError::BodyTooLarge`] if the body exceeds the 16-bit length.
pub fn encode_packet<P: Packet>(packet: &P) -> Result<Bytes, ProtocolError> {
    let mut out = BytesMut::with_capacity(HEADER_LEN + 32);
    // Reserve the header, fill in the body, then patch the header once the
    // body length is known.
    out.resize(HEADER_LEN, 0);
    packet.encode_body(&mut out);

    let body_len = out.len() - HEADER_LEN;
    let header = encode_header(packet.tag(), body_len)?;
    out[..HEADER_LEN].copy_from_slice(&header);

    tracing::trace!(packet = packet.name(), tag = packet.tag(), body_len, "encoded packet");
    Ok(out.freeze())
}

/// Decodes the packet carried by `frame`.
pub fn decode_packet<P: Packet>(frame: &Frame) -> Result<P, ProtocolError> {
    P::decode_body(frame.header.kind, &frame.body)
}

/// Takes one complete frame off `buf` and decodes it.
///
/// Returns `Ok(None)` while the next frame is incomplete. On a non-fatal
/// error the offending frame has already been consumed.
pub fn take_packet<P: Packet>(buf: &mut BytesMut) -> Result<Option<P>, ProtocolError> {
    match try_take_frame(buf, P::VARIANT_COUNT)? {
        Some(frame) => decode_packet(&frame).map(Some),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// ClientPacket
// ---------------------------------------------------------------------------

/// Everything a client may send to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    JoinLobby(JoinLobbyRequest),
    LobbyReady(LobbyReadyRequest),
    GameReady(GameReadyRequest),
    PlayerMove(PlayerMoveRequest),
    FireballShot(FireballShotRequest),
}

impl Packet for ClientPacket {
    const VARIANT_COUNT: u16 = 5;

    fn tag(&self) -> u16 {
        match self {
            Self::JoinLobby(_) => 0,
            Self::LobbyReady(_) => 1,
            Self::GameReady(_) => 2,
            Self::PlayerMove(_) => 3,
            Self::FireballShot(_) => 4,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::JoinLobby(_) => "JoinLobbyRequest",
            Self::LobbyReady(_) => "LobbyReadyRequest",
            Self::GameReady(_) => "GameReadyRequest",
            Self::PlayerMove(_) => "PlayerMoveRequest",
            Self::FireballShot(_) => "FireballShotRequest",
        }
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            Self::JoinLobby(p) => encode_body(p, dst),
            Self::LobbyReady(p) => encode_body(p, dst),
            Self::GameReady(p) => encode_body(p, dst),
            Self::PlayerMove(p) => encode_body(p, dst),
            Self::FireballShot(p) => encode_body(p, dst),
        }
    }

    fn decode_body(tag: u16, body: &[u8]) -> Result<Self, ProtocolError> {
        match tag {
            0 => decode_body(body).map(Self::JoinLobby),
            1 => decode_body(body).map(Self::LobbyReady),
            2 => decode_body(body).map(Self::GameReady),
            3 => decode_body(body).map(Self::PlayerMove),
            4 => decode_body(body).map(Self::FireballShot),
            _ => Err(ProtocolError::InvalidType {
                tag,
                count: Self::VARIANT_COUNT,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerPacket
// ---------------------------------------------------------------------------

/// Everything the server may send to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    JoinLobby(JoinLobbyResponse),
    LobbyReady(LobbyReadyResponse),
    StartGame(StartGameResponse),
    GameReady(GameReadyResponse),
    PlayerMove(PlayerMoveResponse),
    EnemyUpdate(EnemyUpdateResponse),
    UpdateFireballs(UpdateFireballsResponse),
    BaseHit(BaseHitResponse),
    GameOver(GameOverResponse),
}

impl Packet for ServerPacket {
    const VARIANT_COUNT: u16 = 9;

    fn tag(&self) -> u16 {
        match self {
            Self::JoinLobby(_) => 0,
            Self::LobbyReady(_) => 1,
            Self::StartGame(_) => 2,
            Self::GameReady(_) => 3,
            Self::PlayerMove(_) => 4,
            Self::EnemyUpdate(_) => 5,
            Self::UpdateFireballs(_) => 6,
            Self::BaseHit(_) => 7,
            Self::GameOver(_) => 8,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::JoinLobby(_) => "JoinLobbyResponse",
            Self::LobbyReady(_) => "LobbyReadyResponse",
            Self::StartGame(_) => "StartGameResponse",
            Self::GameReady(_) => "GameReadyResponse",
            Self::PlayerMove(_) => "PlayerMoveResponse",
            Self::EnemyUpdate(_) => "EnemyUpdateResponse",
            Self::UpdateFireballs(_) => "UpdateFireballsResponse",
            Self::BaseHit(_) => "BaseHitResponse",
            Self::GameOver(_) => "GameOverResponse",
        }
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            Self::JoinLobby(p) => encode_body(p, dst),
            Self::LobbyReady(p) => encode_body(p, dst),
            Self::StartGame(p) => encode_body(p, dst),
            Self::GameReady(p) => encode_body(p, dst),
            Self::PlayerMove(p) => encode_body(p, dst),
            Self::EnemyUpdate(p) => encode_body(p, dst),
            Self::UpdateFireballs(p) => encode_body(p, dst),
            Self::BaseHit(p) => encode_body(p, dst),
            Self::GameOver(p) => encode_body(p, dst),
        }
    }

    fn decode_body(tag: u16, body: &[u8]) -> Result<Self, ProtocolError> {
        match tag {
            0 => decode_body(body).map(Self::JoinLobby),
            1 => decode_body(body).map(Self::LobbyReady),
            2 => decode_body(body).map(Self::StartGame),
            3 => decode_body(body).map(Self::GameReady),
            4 => decode_body(body).map(Self::PlayerMove),
            5 => decode_body(body).map(Self::EnemyUpdate),
            6 => decode_body(body).map(Self::UpdateFireballs),
            7 => decode_body(body).map(Self::BaseHit),
            8 => decode_body(body).map(Self::GameOver),
            _ => Err(ProtocolError::InvalidType {
                tag,
                count: Self::VARIANT_COUNT,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// `impl From<Payload> for Union` for each variant, so sessions can take
/// `impl Into<ClientPacket>` / `impl Into<ServerPacket>`.
macro_rules! impl_from_payload {
    ($union:ident { $($variant:ident($payload:ty)),* $(,)? }) => {
        $(
            impl From<$payload> for $union {
                fn from(p: $payload) -> Self {
                    Self::$variant(p)
                }
            }
        )*
    };
}

impl_from_payload!(ClientPacket {
    JoinLobby(JoinLobbyRequest),
    LobbyReady(LobbyReadyRequest),
    GameReady(GameReadyRequest),
    PlayerMove(PlayerMoveRequest),
    FireballShot(FireballShotRequest),
});

impl_from_payload!(ServerPacket {
    JoinLobby(JoinLobbyResponse),
    LobbyReady(LobbyReadyResponse),
    StartGame(StartGameResponse),
    GameReady(GameReadyResponse),
    PlayerMove(PlayerMoveResponse),
    EnemyUpdate(EnemyUpdateResponse),
    UpdateFireballs(UpdateFireballsResponse),
    BaseHit(BaseHitResponse),
    GameOver(GameOverResponse),
});
