//! The authoritative server: lobby, then one round of base defence.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use hearthguard::prelude::*;
use tracing::{debug, info, warn};

use crate::game::{self, World};

/// How often enemies and fireballs are pushed to clients, in seconds.
const SYNC_INTERVAL: f32 = 0.05;

enum Phase {
    Lobby { ready: BTreeSet<PeerId> },
    Playing { world: World, since_sync: f32 },
    Over,
}

pub struct ServerGame {
    session: ServerSession,
    expected_players: usize,
    phase: Phase,
}

impl ServerGame {
    pub fn new(session: ServerSession, expected_players: usize) -> Self {
        Self {
            session,
            expected_players,
            phase: Phase::Lobby {
                ready: BTreeSet::new(),
            },
        }
    }

    /// One tick: accept, drain every packet, step the world, sync.
    pub fn tick(&mut self, dt: f32) -> Result<ControlFlow<()>, SessionError> {
        if matches!(self.phase, Phase::Lobby { .. })
            && self.session.peer_count() < self.expected_players
        {
            self.session.accept_one_peer_if_any()?;
        }

        while let Some((peer, packet)) = self.session.poll_message() {
            self.handle(peer, packet)?;
        }
        self.handle_disconnects();

        let Phase::Playing { world, since_sync } = &mut self.phase else {
            return Ok(match self.phase {
                Phase::Over => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            });
        };

        if self.session.peer_count() == 0 {
            info!("every player left, ending the round");
            self.phase = Phase::Over;
            return Ok(ControlFlow::Break(()));
        }

        let outcome = world.step(dt);
        *since_sync += dt;
        let sync = if *since_sync >= SYNC_INTERVAL {
            *since_sync = 0.0;
            Some((
                EnemyUpdateResponse {
                    enemies: world.enemies().to_vec(),
                },
                UpdateFireballsResponse {
                    fireballs: world.fireballs().to_vec(),
                },
            ))
        } else {
            None
        };

        if let Some((enemies, fireballs)) = sync {
            deliver(self.session.broadcast(enemies))?;
            deliver(self.session.broadcast(fireballs))?;
        }

        let over = match outcome.base_hit {
            Some(health) if health <= 0 => Some(false),
            Some(health) => {
                info!(health, "base hit");
                deliver(self.session.broadcast(BaseHitResponse { new_health: health }))?;
                None
            }
            None if outcome.cleared => Some(true),
            None => None,
        };

        if let Some(is_won) = over {
            info!(is_won, base_health = world.base_health(), "round over");
            deliver(self.session.broadcast(GameOverResponse { is_won }))?;
            self.phase = Phase::Over;
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }

    fn handle(&mut self, peer: PeerId, packet: ClientPacket) -> Result<(), SessionError> {
        debug!(%peer, packet = packet.name(), "received");
        let mut check_start = false;
        match (&mut self.phase, packet) {
            (Phase::Lobby { .. }, ClientPacket::JoinLobby(_)) => {
                let connected_players = u8::try_from(self.session.peer_count()).unwrap_or(u8::MAX);
                info!(%peer, connected_players, "joined lobby");
                deliver(self.session.broadcast(JoinLobbyResponse {
                    player_id: peer.into_inner(),
                    connected_players,
                }))?;
            }
            (Phase::Lobby { ready }, ClientPacket::LobbyReady(request)) => {
                if request.is_ready {
                    ready.insert(peer);
                } else {
                    ready.remove(&peer);
                }
                deliver(self.session.broadcast(LobbyReadyResponse {
                    player_id: peer.into_inner(),
                    is_ready: request.is_ready,
                }))?;
                check_start = true;
            }
            (Phase::Playing { world, .. }, ClientPacket::GameReady(_)) => {
                let Some(this_player_pos) = world.player_pos(peer) else {
                    return Ok(());
                };
                let (other, other_player_pos) = world.other_player(peer);
                let snapshot = GameReadyResponse {
                    this_player_id: peer.into_inner(),
                    this_player_pos,
                    other_id: other.into_inner(),
                    other_player_pos,
                    map: world.map().clone(),
                };
                deliver(self.session.send_to(peer, snapshot))?;
            }
            (Phase::Playing { world, .. }, ClientPacket::PlayerMove(request)) => {
                if let Some(response) = world.move_player(peer, &request) {
                    deliver(self.session.broadcast(response))?;
                }
            }
            (Phase::Playing { world, .. }, ClientPacket::FireballShot(request)) => {
                world.add_fireball(request.fireball);
            }
            (_, packet) => {
                debug!(%peer, packet = packet.name(), "ignored in this phase");
            }
        }
        if check_start {
            self.start_if_everyone_ready()?;
        }
        Ok(())
    }

    fn start_if_everyone_ready(&mut self) -> Result<(), SessionError> {
        let Phase::Lobby { ready } = &self.phase else {
            return Ok(());
        };
        let everyone = self.session.peer_count() == self.expected_players
            && self.session.peers().all(|p| ready.contains(&p));
        if !everyone {
            return Ok(());
        }

        info!(players = self.expected_players, "everyone ready, starting");
        deliver(self.session.broadcast(StartGameResponse))?;
        self.phase = Phase::Playing {
            world: World::new(game::arena(), self.session.peers()),
            since_sync: 0.0,
        };
        Ok(())
    }

    fn handle_disconnects(&mut self) {
        for peer in self.session.take_disconnected() {
            info!(%peer, "player left");
            match &mut self.phase {
                Phase::Lobby { ready } => {
                    ready.remove(&peer);
                }
                Phase::Playing { world, .. } => world.remove_player(peer),
                Phase::Over => {}
            }
        }
    }
}

/// A full send buffer only costs this tick's update; anything else stops
/// the server.
fn deliver(result: Result<(), SessionError>) -> Result<(), SessionError> {
    match result {
        Err(e) if e.is_would_block() => {
            warn!("send buffer full, update dropped");
            Ok(())
        }
        other => other,
    }
}

/// Binds, runs the lobby and the round until it ends or `cancel` fires.
pub async fn run(
    config: &NetConfig,
    cancel: CancellationToken,
) -> Result<(), HearthguardError> {
    let session = ServerSession::bind(&config.address, config.port)?;
    let mut game = ServerGame::new(session, config.expected_players);
    let scheduler = TickScheduler::new(config.tick_config());

    let mut failure = None;
    let metrics = scheduler
        .run(cancel, |tick| match game.tick(tick.dt_secs()) {
            Ok(flow) => flow,
            Err(e) => {
                failure = Some(e);
                ControlFlow::Break(())
            }
        })
        .await;

    debug!(?metrics, "server loop metrics");
    game.session.close();
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
