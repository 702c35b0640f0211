//! A headless bot client: joins, readies up, wanders and shoots at
//! whatever is heading for the base.

use std::ops::ControlFlow;

use hearthguard::prelude::*;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::game;

/// Ticks between two shots.
const FIRE_EVERY: u64 = 30;

/// What the bot has learned from the server so far.
#[derive(Debug, Default)]
pub struct Bot {
    player_id: Option<u32>,
    ready_sent: bool,
    pos: Vec2,
    base: Vec2,
    enemies: Vec<EnemyState>,
    in_game: bool,
    base_health: i32,
    /// `Some(is_won)` once the round is over.
    result: Option<bool>,
}

impl Bot {
    pub fn new() -> Self {
        Self {
            base_health: game::BASE_MAX_HEALTH,
            ..Self::default()
        }
    }

    /// Updates the bot from one server packet and returns the reply, if
    /// the packet calls for one.
    pub fn handle(&mut self, packet: ServerPacket) -> Option<ClientPacket> {
        match packet {
            ServerPacket::JoinLobby(r) => {
                info!(player = r.player_id, lobby = r.connected_players, "lobby join");
                // Ready up once the lobby has answered. Which player we are is
                // only certain after the game snapshot arrives.
                if !self.ready_sent {
                    self.ready_sent = true;
                    return Some(LobbyReadyRequest { is_ready: true }.into());
                }
            }
            ServerPacket::LobbyReady(r) => {
                info!(player = r.player_id, ready = r.is_ready, "lobby ready");
            }
            ServerPacket::StartGame(_) => {
                info!("game starting");
                return Some(GameReadyRequest.into());
            }
            ServerPacket::GameReady(r) => {
                info!(
                    me = r.this_player_id,
                    other = r.other_id,
                    map = r.map.id,
                    "got initial snapshot"
                );
                self.player_id = Some(r.this_player_id);
                self.pos = r.this_player_pos;
                self.base = r.map.find(TileKind::Base).unwrap_or_default();
                self.in_game = true;
            }
            ServerPacket::PlayerMove(r) => {
                if Some(r.player_id) == self.player_id {
                    self.pos = r.new_pos;
                }
                debug!(player = r.player_id, x = r.new_pos.x, y = r.new_pos.y, "player moved");
            }
            ServerPacket::EnemyUpdate(r) => self.enemies = r.enemies,
            ServerPacket::UpdateFireballs(r) => {
                debug!(fireballs = r.fireballs.len(), "fireballs");
            }
            ServerPacket::BaseHit(r) => {
                warn!(health = r.new_health, "base hit");
                self.base_health = r.new_health;
            }
            ServerPacket::GameOver(r) => {
                info!(won = r.is_won, "game over");
                self.result = Some(r.is_won);
            }
        }
        None
    }

    /// This tick's own actions: an occasional random step, and a shot at
    /// the enemy closest to the base every [`FIRE_EVERY`] ticks.
    pub fn act(&self, tick: u64, move_chance: f64, rng: &mut impl Rng) -> Vec<ClientPacket> {
        let mut out = Vec::new();
        if !self.in_game {
            return out;
        }

        if rng.random_bool(move_chance.clamp(0.0, 1.0)) {
            if let Some(direction) = Direction::ALL.choose(rng) {
                out.push(
                    PlayerMoveRequest {
                        direction: *direction,
                    }
                    .into(),
                );
            }
        }

        if tick % FIRE_EVERY == 0 {
            if let (Some(player_id), Some(target)) = (self.player_id, self.target()) {
                out.push(
                    FireballShotRequest {
                        player_id,
                        fireball: FireballState {
                            pos: self.pos,
                            direction: game::aim(self.pos, target),
                        },
                    }
                    .into(),
                );
            }
        }
        out
    }

    fn target(&self) -> Option<Vec2> {
        let d = |e: &EnemyState| (e.pos.x - self.base.x).powi(2) + (e.pos.y - self.base.y).powi(2);
        self.enemies
            .iter()
            .min_by(|a, b| d(a).total_cmp(&d(b)))
            .map(|e| e.pos)
    }

    pub fn result(&self) -> Option<bool> {
        self.result
    }
}

/// Drains the server's packets, answers them, then sends this tick's
/// own actions.
fn exchange(
    session: &mut ClientSession,
    bot: &mut Bot,
    tick: u64,
    move_chance: f64,
    rng: &mut impl Rng,
) -> Result<(), SessionError> {
    while let Some(packet) = session.poll_message()? {
        if let Some(reply) = bot.handle(packet) {
            session.send(reply)?;
        }
    }
    for packet in bot.act(tick, move_chance, rng) {
        session.send(packet)?;
    }
    Ok(())
}

/// Connects and plays until the round ends, the server goes away or
/// `cancel` fires.
pub async fn run(
    config: &NetConfig,
    move_chance: f64,
    cancel: CancellationToken,
) -> Result<(), HearthguardError> {
    let mut session = ClientSession::connect(&config.address, config.port)?;
    session.send(JoinLobbyRequest)?;

    let mut bot = Bot::new();
    let mut rng = rand::rng();
    let mut failure: Option<SessionError> = None;

    let scheduler = TickScheduler::new(config.tick_config());
    scheduler
        .run(cancel, |tick| {
            match exchange(&mut session, &mut bot, tick.tick, move_chance, &mut rng) {
                Ok(()) if bot.result().is_some() => ControlFlow::Break(()),
                Ok(()) => ControlFlow::Continue(()),
                Err(e) if e.is_would_block() => {
                    warn!("send buffer full, skipping the rest of this tick");
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            }
        })
        .await;

    if let Some(e) = failure {
        return Err(e.into());
    }
    match bot.result() {
        Some(true) => info!(base_health = bot.base_health, "we held the base"),
        Some(false) => info!("the base fell"),
        None => info!("left before the round ended"),
    }
    session.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn in_game_bot() -> Bot {
        let mut bot = Bot::new();
        bot.handle(ServerPacket::GameReady(GameReadyResponse {
            this_player_id: 4,
            this_player_pos: Vec2::new(64.0, 64.0),
            other_id: 5,
            other_player_pos: Vec2::new(64.0, 64.0),
            map: game::arena(),
        }));
        bot
    }

    #[test]
    fn test_handle_first_join_replies_ready_once() {
        let mut bot = Bot::new();
        let join = |player_id| {
            ServerPacket::from(JoinLobbyResponse {
                player_id,
                connected_players: 1,
            })
        };
        assert_eq!(
            bot.handle(join(1)),
            Some(ClientPacket::from(LobbyReadyRequest { is_ready: true }))
        );
        assert_eq!(bot.handle(join(2)), None);
    }

    #[test]
    fn test_handle_start_game_asks_for_snapshot() {
        let mut bot = Bot::new();
        assert_eq!(
            bot.handle(StartGameResponse.into()),
            Some(ClientPacket::from(GameReadyRequest))
        );
    }

    #[test]
    fn test_handle_own_move_updates_position() {
        let mut bot = in_game_bot();
        let new_pos = Vec2::new(65.0, 64.0);
        bot.handle(PlayerMoveResponse { player_id: 5, new_pos: Vec2::default() }.into());
        assert_eq!(bot.pos, Vec2::new(64.0, 64.0));
        bot.handle(PlayerMoveResponse { player_id: 4, new_pos }.into());
        assert_eq!(bot.pos, new_pos);
    }

    #[test]
    fn test_act_does_nothing_before_snapshot() {
        let bot = Bot::new();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(bot.act(FIRE_EVERY, 1.0, &mut rng).is_empty());
    }

    #[test]
    fn test_act_fires_at_enemy_nearest_base() {
        let mut bot = in_game_bot();
        let base = bot.base;
        let near = Vec2::new(base.x + 32.0, base.y);
        bot.handle(
            EnemyUpdateResponse {
                enemies: vec![
                    EnemyState { pos: Vec2::new(400.0, 400.0), destination: base, health: 30 },
                    EnemyState { pos: near, destination: base, health: 30 },
                ],
            }
            .into(),
        );

        let mut rng = StdRng::seed_from_u64(7);
        let packets = bot.act(FIRE_EVERY, 0.0, &mut rng);
        let [ClientPacket::FireballShot(shot)] = packets.as_slice() else {
            panic!("expected one shot, got {packets:?}");
        };
        assert_eq!(shot.player_id, 4);
        assert_eq!(shot.fireball.direction, game::aim(bot.pos, near));
    }

    #[test]
    fn test_game_over_records_result() {
        let mut bot = in_game_bot();
        bot.handle(BaseHitResponse { new_health: 90 }.into());
        assert_eq!(bot.base_health, 90);
        assert_eq!(bot.result(), None);
        bot.handle(GameOverResponse { is_won: false }.into());
        assert_eq!(bot.result(), Some(false));
    }
}
