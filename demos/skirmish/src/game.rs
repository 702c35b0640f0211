//! Server-side simulation: players, enemies walking to the base, fireballs.

use std::collections::BTreeMap;

use hearthguard::prelude::*;
use rand::Rng;

pub const BASE_MAX_HEALTH: i32 = 100;
const BASE_DAMAGE: i32 = 10;
const BASE_DAMAGE_COOLDOWN: f32 = 2.0;
const ENEMY_HEALTH: i32 = 30;
const ENEMY_SPEED: f32 = 24.0;
const FIREBALL_DAMAGE: i32 = 10;
const FIREBALL_SPEED: f32 = 160.0;
const ENEMIES_PER_SPAWNER: u32 = 2;
const SPAWN_DELAY: f32 = 3.0;

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// The only level: a walled arena with the base in the middle and a
/// spawner in two corners.
pub fn arena() -> MapData {
    let mut map = MapData::empty(1);
    for i in 0..MAP_WIDTH {
        map.set_tile(i, 0, TileKind::Wall);
        map.set_tile(i, MAP_HEIGHT - 1, TileKind::Wall);
    }
    for i in 0..MAP_HEIGHT {
        map.set_tile(0, i, TileKind::Wall);
        map.set_tile(MAP_WIDTH - 1, i, TileKind::Wall);
    }
    map.set_tile(4, 4, TileKind::PlayerStart);
    map.set_tile(MAP_WIDTH / 2, MAP_HEIGHT / 2, TileKind::Base);
    map.set_tile(MAP_WIDTH - 4, 3, TileKind::EnemySpawner);
    map.set_tile(MAP_WIDTH - 4, MAP_HEIGHT - 4, TileKind::EnemySpawner);
    map
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

fn distance(a: Vec2, b: Vec2) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Moves `from` towards `to` by at most `max_step`.
fn step_towards(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let d = distance(from, to);
    if d <= max_step || d == 0.0 {
        return to;
    }
    let t = max_step / d;
    Vec2::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}

/// Unit vector from `from` to `to`, or zero if they coincide.
pub fn aim(from: Vec2, to: Vec2) -> Vec2 {
    let d = distance(from, to);
    if d == 0.0 {
        return Vec2::default();
    }
    Vec2::new((to.x - from.x) / d, (to.y - from.y) / d)
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Spawner {
    pos: Vec2,
    left: u32,
    timer: f32,
}

/// What a simulation step produced that clients must hear about.
#[derive(Debug, Default, PartialEq)]
pub struct StepOutcome {
    /// The base took damage; its new health.
    pub base_hit: Option<i32>,
    /// Every spawner is empty and every enemy is dead.
    pub cleared: bool,
}

#[derive(Debug)]
pub struct World {
    map: MapData,
    base: Vec2,
    players: BTreeMap<PeerId, Vec2>,
    enemies: Vec<EnemyState>,
    fireballs: Vec<FireballState>,
    spawners: Vec<Spawner>,
    base_health: i32,
    base_cooldown: f32,
}

impl World {
    /// A fresh round on `map` with every player on the start tile.
    pub fn new(map: MapData, players: impl IntoIterator<Item = PeerId>) -> Self {
        let start = map.find(TileKind::PlayerStart).unwrap_or_default();
        let base = map.find(TileKind::Base).unwrap_or_default();

        let mut rng = rand::rng();
        let spawners = map
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == TileKind::EnemySpawner)
            .map(|(i, _)| Spawner {
                pos: Vec2::new(
                    (i % MAP_WIDTH) as f32 * TILE_SIZE,
                    (i / MAP_WIDTH) as f32 * TILE_SIZE,
                ),
                left: ENEMIES_PER_SPAWNER,
                // Stagger the spawners a little.
                timer: rng.random_range(0.0..0.5),
            })
            .collect();

        Self {
            players: players.into_iter().map(|p| (p, start)).collect(),
            map,
            base,
            enemies: Vec::new(),
            fireballs: Vec::new(),
            spawners,
            base_health: BASE_MAX_HEALTH,
            base_cooldown: 0.0,
        }
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn base_health(&self) -> i32 {
        self.base_health
    }

    pub fn player_pos(&self, peer: PeerId) -> Option<Vec2> {
        self.players.get(&peer).copied()
    }

    /// Any player other than `peer`, for the two-player snapshot. Falls
    /// back to `peer` itself in a single-player round.
    pub fn other_player(&self, peer: PeerId) -> (PeerId, Vec2) {
        self.players
            .iter()
            .find(|(id, _)| **id != peer)
            .map(|(id, pos)| (*id, *pos))
            .unwrap_or((peer, self.player_pos(peer).unwrap_or_default()))
    }

    pub fn remove_player(&mut self, peer: PeerId) {
        self.players.remove(&peer);
    }

    /// Applies a move and returns the authoritative result, or `None` for
    /// a peer that is not playing.
    pub fn move_player(
        &mut self,
        peer: PeerId,
        request: &PlayerMoveRequest,
    ) -> Option<PlayerMoveResponse> {
        let pos = self.players.get_mut(&peer)?;
        let response = request.apply(peer.into_inner(), *pos);
        *pos = response.new_pos;
        Some(response)
    }

    pub fn add_fireball(&mut self, fireball: FireballState) {
        self.fireballs.push(fireball);
    }

    pub fn enemies(&self) -> &[EnemyState] {
        &self.enemies
    }

    pub fn fireballs(&self) -> &[FireballState] {
        &self.fireballs
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        self.base_cooldown -= dt;

        for spawner in &mut self.spawners {
            if spawner.left == 0 {
                continue;
            }
            spawner.timer -= dt;
            if spawner.timer <= 0.0 {
                spawner.left -= 1;
                spawner.timer = SPAWN_DELAY;
                tracing::debug!(x = spawner.pos.x, y = spawner.pos.y, "enemy spawned");
                self.enemies.push(EnemyState {
                    pos: spawner.pos,
                    destination: self.base,
                    health: ENEMY_HEALTH,
                });
            }
        }

        for enemy in &mut self.enemies {
            if distance(enemy.pos, enemy.destination) > TILE_SIZE {
                enemy.pos = step_towards(enemy.pos, enemy.destination, ENEMY_SPEED * dt);
            }
        }

        let arena = MAP_WIDTH as f32 * TILE_SIZE;
        for fireball in &mut self.fireballs {
            fireball.pos.x += fireball.direction.x * FIREBALL_SPEED * dt;
            fireball.pos.y += fireball.direction.y * FIREBALL_SPEED * dt;
        }
        self.fireballs
            .retain(|f| (0.0..=arena).contains(&f.pos.x) && (0.0..=arena).contains(&f.pos.y));

        self.resolve_fireball_hits();

        let at_base = self
            .enemies
            .iter()
            .any(|e| distance(e.pos, self.base) <= TILE_SIZE);
        if at_base && self.base_cooldown <= 0.0 {
            self.base_health -= BASE_DAMAGE;
            self.base_cooldown = BASE_DAMAGE_COOLDOWN;
            outcome.base_hit = Some(self.base_health);
        }

        outcome.cleared =
            self.enemies.is_empty() && self.spawners.iter().all(|s| s.left == 0);
        outcome
    }

    /// Each fireball damages the first enemy it overlaps and disappears.
    fn resolve_fireball_hits(&mut self) {
        let enemies = &mut self.enemies;
        self.fireballs.retain(|fireball| {
            let Some(enemy) = enemies
                .iter_mut()
                .find(|e| distance(e.pos, fireball.pos) < TILE_SIZE)
            else {
                return true;
            };
            enemy.health -= FIREBALL_DAMAGE;
            tracing::debug!(health = enemy.health, "enemy hit");
            false
        });
        enemies.retain(|e| e.health > 0);
    }
}
