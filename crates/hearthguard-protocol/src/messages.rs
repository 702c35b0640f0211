//! Packet payloads.
//!
//! One struct per message. Requests flow client → server, responses
//! flow server → client. Everything here is a fixed layout except
//! [`EnemyUpdateResponse`] and [`UpdateFireballsResponse`], which carry
//! lists and encode a count prefix.

use bytes::BytesMut;

use crate::types::{Direction, EnemyState, FireballState, MapData, Vec2};
use crate::wire::{fixed_size, WireFormat};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// "Let me into the lobby." Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinLobbyRequest;

/// Toggle this player's ready flag in the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyReadyRequest {
    pub is_ready: bool,
}

/// Sent once the client has switched to the game scene and wants the
/// initial snapshot. Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameReadyRequest;

/// Move the sender's player one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMoveRequest {
    pub direction: Direction,
}

impl PlayerMoveRequest {
    /// The authoritative answer to this request for a player currently
    /// at `current`.
    pub fn apply(&self, player_id: u32, current: Vec2) -> PlayerMoveResponse {
        PlayerMoveResponse {
            player_id,
            new_pos: current + self.direction.step(),
        }
    }
}

/// A player fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireballShotRequest {
    pub player_id: u32,
    pub fireball: FireballState,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Someone joined the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinLobbyResponse {
    /// The player who joined.
    pub player_id: u32,
    /// Lobby size including the new player.
    pub connected_players: u8,
}

/// A lobby member changed their ready flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyReadyResponse {
    pub player_id: u32,
    pub is_ready: bool,
}

/// The lobby is closed and the game scene should start. Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartGameResponse;

/// The initial game snapshot for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct GameReadyResponse {
    pub this_player_id: u32,
    pub this_player_pos: Vec2,
    pub other_id: u32,
    pub other_player_pos: Vec2,
    pub map: MapData,
}

/// A player's new authoritative position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerMoveResponse {
    pub player_id: u32,
    pub new_pos: Vec2,
}

/// Every live enemy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnemyUpdateResponse {
    pub enemies: Vec<EnemyState>,
}

/// Every live fireball.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateFireballsResponse {
    pub fireballs: Vec<FireballState>,
}

/// The base took damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHitResponse {
    pub new_health: i32,
}

/// The round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOverResponse {
    pub is_won: bool,
}

// ---------------------------------------------------------------------------
// Wire layouts
// ---------------------------------------------------------------------------

impl WireFormat for JoinLobbyRequest {
    const FIXED_SIZE: Option<usize> = Some(0);

    fn encode(&self, _dst: &mut BytesMut) {}

    fn decode(_src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

impl WireFormat for LobbyReadyRequest {
    const FIXED_SIZE: Option<usize> = Some(1);

    fn encode(&self, dst: &mut BytesMut) {
        self.is_ready.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            is_ready: bool::decode(src)?,
        })
    }
}

impl WireFormat for GameReadyRequest {
    const FIXED_SIZE: Option<usize> = Some(0);

    fn encode(&self, _dst: &mut BytesMut) {}

    fn decode(_src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

impl WireFormat for PlayerMoveRequest {
    const FIXED_SIZE: Option<usize> = Some(fixed_size::<Direction>());

    fn encode(&self, dst: &mut BytesMut) {
        self.direction.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            direction: Direction::decode(src)?,
        })
    }
}

impl WireFormat for FireballShotRequest {
    const FIXED_SIZE: Option<usize> = Some(4 + fixed_size::<FireballState>());

    fn encode(&self, dst: &mut BytesMut) {
        self.player_id.encode(dst);
        self.fireball.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            player_id: u32::decode(src)?,
            fireball: FireballState::decode(src)?,
        })
    }
}

impl WireFormat for JoinLobbyResponse {
    const FIXED_SIZE: Option<usize> = Some(4 + 1);

    fn encode(&self, dst: &mut BytesMut) {
        self.player_id.encode(dst);
        self.connected_players.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            player_id: u32::decode(src)?,
            connected_players: u8::decode(src)?,
        })
    }
}

impl WireFormat for LobbyReadyResponse {
    const FIXED_SIZE: Option<usize> = Some(4 + 1);

    fn encode(&self, dst: &mut BytesMut) {
        self.player_id.encode(dst);
        self.is_ready.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            player_id: u32::decode(src)?,
            is_ready: bool::decode(src)?,
        })
    }
}

impl WireFormat for StartGameResponse {
    const FIXED_SIZE: Option<usize> = Some(0);

    fn encode(&self, _dst: &mut BytesMut) {}

    fn decode(_src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

impl WireFormat for GameReadyResponse {
    const FIXED_SIZE: Option<usize> =
        Some(2 * (4 + fixed_size::<Vec2>()) + fixed_size::<MapData>());

    fn encode(&self, dst: &mut BytesMut) {
        self.this_player_id.encode(dst);
        self.this_player_pos.encode(dst);
        self.other_id.encode(dst);
        self.other_player_pos.encode(dst);
        self.map.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            this_player_id: u32::decode(src)?,
            this_player_pos: Vec2::decode(src)?,
            other_id: u32::decode(src)?,
            other_player_pos: Vec2::decode(src)?,
            map: MapData::decode(src)?,
        })
    }
}

impl WireFormat for PlayerMoveResponse {
    const FIXED_SIZE: Option<usize> = Some(4 + fixed_size::<Vec2>());

    fn encode(&self, dst: &mut BytesMut) {
        self.player_id.encode(dst);
        self.new_pos.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            player_id: u32::decode(src)?,
            new_pos: Vec2::decode(src)?,
        })
    }
}

impl WireFormat for EnemyUpdateResponse {
    const FIXED_SIZE: Option<usize> = None;

    fn encode(&self, dst: &mut BytesMut) {
        self.enemies.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            enemies: Vec::decode(src)?,
        })
    }
}

impl WireFormat for UpdateFireballsResponse {
    const FIXED_SIZE: Option<usize> = None;

    fn encode(&self, dst: &mut BytesMut) {
        self.fireballs.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            fireballs: Vec::decode(src)?,
        })
    }
}

impl WireFormat for BaseHitResponse {
    const FIXED_SIZE: Option<usize> = Some(4);

    fn encode(&self, dst: &mut BytesMut) {
        self.new_health.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            new_health: i32::decode(src)?,
        })
    }
}

impl WireFormat for GameOverResponse {
    const FIXED_SIZE: Option<usize> = Some(1);

    fn encode(&self, dst: &mut BytesMut) {
        self.is_won.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            is_won: bool::decode(src)?,
        })
    }
}
