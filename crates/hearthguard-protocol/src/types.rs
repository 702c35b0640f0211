//! Plain data shapes carried inside packets.
//!
//! These are the protocol's view of game state: positions, directions,
//! the tile map snapshot and per-entity summaries. The game simulation
//! owns the real entities and converts to and from these.

use std::ops::Add;

use bytes::BytesMut;

use crate::wire::{ensure, fixed_size, WireFormat};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A 2D point or vector in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl WireFormat for Vec2 {
    const FIXED_SIZE: Option<usize> = Some(8);

    fn encode(&self, dst: &mut BytesMut) {
        self.x.encode(dst);
        self.y.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: f32::decode(src)?,
            y: f32::decode(src)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// A movement direction. Screen coordinates: `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// The single-axis unit step for this direction.
    pub fn step(self) -> Vec2 {
        match self {
            Self::Up => Vec2::new(0.0, -1.0),
            Self::Down => Vec2::new(0.0, 1.0),
            Self::Left => Vec2::new(-1.0, 0.0),
            Self::Right => Vec2::new(1.0, 0.0),
        }
    }
}

impl WireFormat for Direction {
    const FIXED_SIZE: Option<usize> = Some(1);

    fn encode(&self, dst: &mut BytesMut) {
        let raw: u8 = match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        };
        raw.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        match u8::decode(src)? {
            0 => Ok(Self::Up),
            1 => Ok(Self::Down),
            2 => Ok(Self::Left),
            3 => Ok(Self::Right),
            other => Err(ProtocolError::InvalidValue {
                field: "direction",
                value: other.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tile map
// ---------------------------------------------------------------------------

/// Number of tiles in the map horizontally.
pub const MAP_WIDTH: usize = 32;
/// Number of tiles in the map vertically.
pub const MAP_HEIGHT: usize = 32;
/// Side of one square tile in pixels.
pub const TILE_SIZE: f32 = 16.0;
/// Total tiles in one map snapshot.
pub const MAP_TILES: usize = MAP_WIDTH * MAP_HEIGHT;

/// What occupies one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileKind {
    #[default]
    Ground,
    Wall,
    PlayerStart,
    EnemySpawner,
    Base,
}

impl WireFormat for TileKind {
    const FIXED_SIZE: Option<usize> = Some(1);

    fn encode(&self, dst: &mut BytesMut) {
        let raw: u8 = match self {
            Self::Ground => 0,
            Self::Wall => 1,
            Self::PlayerStart => 2,
            Self::EnemySpawner => 3,
            Self::Base => 4,
        };
        raw.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        match u8::decode(src)? {
            0 => Ok(Self::Ground),
            1 => Ok(Self::Wall),
            2 => Ok(Self::PlayerStart),
            3 => Ok(Self::EnemySpawner),
            4 => Ok(Self::Base),
            other => Err(ProtocolError::InvalidValue {
                field: "tile",
                value: other.into(),
            }),
        }
    }
}

/// A full snapshot of one level's tiles, row-major.
///
/// Fixed size: one id byte plus [`MAP_TILES`] tile bytes. The tiles are
/// boxed to keep packet enums small.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapData {
    pub id: u8,
    pub tiles: Box<[TileKind; MAP_TILES]>,
}

impl MapData {
    /// A map of the given id filled with ground.
    pub fn empty(id: u8) -> Self {
        Self {
            id,
            tiles: Box::new([TileKind::Ground; MAP_TILES]),
        }
    }

    /// The tile at column `x`, row `y`, if inside the map.
    pub fn tile(&self, x: usize, y: usize) -> Option<TileKind> {
        if x >= MAP_WIDTH || y >= MAP_HEIGHT {
            return None;
        }
        Some(self.tiles[y * MAP_WIDTH + x])
    }

    /// Sets the tile at column `x`, row `y`. Out-of-range writes are ignored.
    pub fn set_tile(&mut self, x: usize, y: usize, kind: TileKind) {
        if x < MAP_WIDTH && y < MAP_HEIGHT {
            self.tiles[y * MAP_WIDTH + x] = kind;
        }
    }

    /// Top-left pixel position of the first tile of `kind`.
    pub fn find(&self, kind: TileKind) -> Option<Vec2> {
        self.tiles.iter().position(|t| *t == kind).map(|i| {
            Vec2::new(
                (i % MAP_WIDTH) as f32 * TILE_SIZE,
                (i / MAP_WIDTH) as f32 * TILE_SIZE,
            )
        })
    }
}

impl WireFormat for MapData {
    const FIXED_SIZE: Option<usize> = Some(1 + MAP_TILES * fixed_size::<TileKind>());

    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(1 + MAP_TILES);
        self.id.encode(dst);
        for tile in self.tiles.iter() {
            tile.encode(dst);
        }
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(src, 1 + MAP_TILES)?;
        let id = u8::decode(src)?;
        let mut tiles = Box::new([TileKind::Ground; MAP_TILES]);
        for tile in tiles.iter_mut() {
            *tile = TileKind::decode(src)?;
        }
        Ok(Self { id, tiles })
    }
}

// ---------------------------------------------------------------------------
// Entity summaries
// ---------------------------------------------------------------------------

/// What a client needs to draw one enemy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnemyState {
    pub pos: Vec2,
    pub destination: Vec2,
    pub health: i32,
}

impl WireFormat for EnemyState {
    const FIXED_SIZE: Option<usize> = Some(2 * fixed_size::<Vec2>() + fixed_size::<i32>());

    fn encode(&self, dst: &mut BytesMut) {
        self.pos.encode(dst);
        self.destination.encode(dst);
        self.health.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            pos: Vec2::decode(src)?,
            destination: Vec2::decode(src)?,
            health: i32::decode(src)?,
        })
    }
}

/// What a client needs to draw one fireball.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FireballState {
    pub pos: Vec2,
    /// Normalized flight direction.
    pub direction: Vec2,
}

impl WireFormat for FireballState {
    const FIXED_SIZE: Option<usize> = Some(2 * fixed_size::<Vec2>());

    fn encode(&self, dst: &mut BytesMut) {
        self.pos.encode(dst);
        self.direction.encode(dst);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            pos: Vec2::decode(src)?,
            direction: Vec2::decode(src)?,
        })
    }
}
