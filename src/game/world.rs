//! World state and the authoritative tick loop

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::store::RecordStore;
use crate::ws::protocol::ServerMsg;

use super::combat::CombatSystem;
use super::environment::{generate_layout, EnvironmentObject, EnvironmentSystem, PendingRespawn};
use super::snapshot;
use super::{StatsUpdate, WorldEvent};

/// Base movement speed in world units per second
pub const MOVE_SPEED: f32 = 260.0;
/// Speed multiplier while charging
pub const CHARGE_SPEED_MULTIPLIER: f32 = 1.6;
/// Clearance kept from the arena edge for spawns and movement targets
const EDGE_MARGIN: f32 = 60.0;
/// Target closer than this is considered reached
const ARRIVE_EPSILON: f32 = 0.01;

/// Player state in the world (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Session-scoped id, fresh on every join
    pub id: Uuid,
    /// Persisted identity this session accumulates into
    pub record_id: Uuid,
    pub tag: String,

    // Position and movement
    pub x: f32,
    pub y: f32,
    /// Facing in radians, derived from the last displacement
    pub direction: f32,
    /// Absolute position the player is heading for
    pub target: Option<(f32, f32)>,
    pub last_x: f32,
    pub last_y: f32,

    // Combat
    pub health: f32,
    pub charging: bool,

    // Stats
    pub score: f32,
    pub damage_dealt: f32,
    pub distance_walked: f32,
    /// Walked distance not yet flushed to the persistence gateway
    pub unflushed_distance: f32,
}

impl PlayerState {
    pub fn new(id: Uuid, record_id: Uuid, tag: String, spawn_x: f32, spawn_y: f32) -> Self {
        Self {
            id,
            record_id,
            tag,
            x: spawn_x,
            y: spawn_y,
            direction: 0.0,
            target: None,
            last_x: spawn_x,
            last_y: spawn_y,
            health: 100.0,
            charging: false,
            score: 0.0,
            damage_dealt: 0.0,
            distance_walked: 0.0,
            unflushed_distance: 0.0,
        }
    }

    /// Reset after a defeat: full health, fresh random position. The
    /// teleport does not count as walked distance.
    pub fn respawn(&mut self, game: &GameConfig, rng: &mut ChaCha8Rng) {
        let (x, y) = random_spawn(game, rng);
        self.x = x;
        self.y = y;
        self.last_x = x;
        self.last_y = y;
        self.target = None;
        self.health = 100.0;
    }
}

/// Random position inside the fenced bounds
fn random_spawn(game: &GameConfig, rng: &mut ChaCha8Rng) -> (f32, f32) {
    (
        rng.gen_range(EDGE_MARGIN..game.map_width - EDGE_MARGIN),
        rng.gen_range(EDGE_MARGIN..game.map_height - EDGE_MARGIN),
    )
}

/// The single shared world model (owned by the world task)
pub struct WorldState {
    pub tick: u64,
    pub players: HashMap<Uuid, PlayerState>,
    pub environment: HashMap<u32, EnvironmentObject>,
    pub pending_respawns: Vec<PendingRespawn>,
    pub rng: ChaCha8Rng,
}

impl WorldState {
    pub fn new(game: &GameConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let environment = generate_layout(&mut rng, game);
        Self {
            tick: 0,
            players: HashMap::new(),
            environment,
            pending_respawns: Vec::new(),
            rng,
        }
    }
}

/// Handle for feeding events into the world and subscribing to snapshots
#[derive(Clone)]
pub struct WorldHandle {
    pub event_tx: mpsc::Sender<WorldEvent>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
}

impl WorldHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }
}

/// The authoritative game world
pub struct GameWorld {
    state: WorldState,
    game: GameConfig,
    event_rx: mpsc::Receiver<WorldEvent>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    records: Option<RecordStore>,
    /// Persistence deltas produced this tick, flushed fire-and-forget
    stats_outbox: Vec<StatsUpdate>,
}

impl GameWorld {
    /// Create the world and its handle
    pub fn new(game: GameConfig, seed: u64, records: Option<RecordStore>) -> (Self, WorldHandle) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);

        let handle = WorldHandle {
            event_tx,
            snapshot_tx: snapshot_tx.clone(),
        };

        let world = Self {
            state: WorldState::new(&game, seed),
            game,
            event_rx,
            snapshot_tx,
            records,
            stats_outbox: Vec::new(),
        };

        (world, handle)
    }

    /// Run the authoritative tick loop until the event channel closes or
    /// shutdown is signalled. No snapshot is broadcast after either one.
    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            tick_rate_hz = self.game.tick_rate_hz,
            map_width = self.game.map_width,
            map_height = self.game.map_height,
            "World started"
        );

        let tick_duration = Duration::from_micros(1_000_000 / self.game.tick_rate_hz.max(1) as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping the tick loop");
                    break;
                }
                _ = tick_interval.tick() => {}
            }
            let started = Instant::now();

            // Drain queued client events
            let disconnected = self.process_events();
            if disconnected {
                break;
            }

            // Run the simulation step; a panicking tick is logged and the
            // scheduler carries on at the next interval
            let tick = self.state.tick;
            if catch_unwind(AssertUnwindSafe(|| self.run_tick())).is_err() {
                error!(tick, "Simulation tick panicked, continuing");
            }

            // Fire-and-forget persistence deltas
            self.flush_stats();

            // Broadcast the full snapshot to all connected clients
            let msg = snapshot::build_snapshot(&self.state.players, &self.state.environment);
            let _ = self.snapshot_tx.send(msg);

            let elapsed = started.elapsed();
            if elapsed > tick_duration {
                warn!(
                    tick = self.state.tick,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Tick overran its period, next tick will be skipped"
                );
            }
        }

        info!(tick = self.state.tick, "World shut down");
    }

    /// Process all pending events. Returns true once the channel is closed.
    fn process_events(&mut self) -> bool {
        loop {
            match self.event_rx.try_recv() {
                Ok(WorldEvent::Join {
                    player_id,
                    record_id,
                    tag,
                    init_tx,
                }) => self.handle_join(player_id, record_id, tag, init_tx),
                Ok(WorldEvent::Move { player_id, x, y }) => self.handle_move(player_id, x, y),
                Ok(WorldEvent::Charge { player_id, active }) => {
                    self.handle_charge(player_id, active)
                }
                Ok(WorldEvent::Leave { player_id }) => self.handle_leave(player_id),
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Insert a fresh player and answer with the init frame
    pub(crate) fn handle_join(
        &mut self,
        player_id: Uuid,
        record_id: Uuid,
        tag: String,
        init_tx: tokio::sync::oneshot::Sender<ServerMsg>,
    ) {
        let (x, y) = random_spawn(&self.game, &mut self.state.rng);
        let player = PlayerState::new(player_id, record_id, tag.clone(), x, y);
        self.state.players.insert(player_id, player);

        let init = snapshot::build_init(player_id, &self.state.players, &self.state.environment);
        // Receiver gone means the connection already dropped; nothing to do
        let _ = init_tx.send(init);

        info!(
            player_id = %player_id,
            tag = %tag,
            player_count = self.state.players.len(),
            "Player joined"
        );
    }

    /// Queue an absolute movement target, clamped to the arena
    pub(crate) fn handle_move(&mut self, player_id: Uuid, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            warn!(player_id = %player_id, "Dropping non-finite move target");
            return;
        }
        if let Some(player) = self.state.players.get_mut(&player_id) {
            let tx = x.clamp(EDGE_MARGIN, self.game.map_width - EDGE_MARGIN);
            let ty = y.clamp(EDGE_MARGIN, self.game.map_height - EDGE_MARGIN);
            player.target = Some((tx, ty));
        }
    }

    pub(crate) fn handle_charge(&mut self, player_id: Uuid, active: bool) {
        if let Some(player) = self.state.players.get_mut(&player_id) {
            player.charging = active;
        }
    }

    /// Remove a player; safe to call again after removal
    pub(crate) fn handle_leave(&mut self, player_id: Uuid) {
        if let Some(player) = self.state.players.remove(&player_id) {
            if player.unflushed_distance > 0.0 {
                self.stats_outbox.push(StatsUpdate {
                    record_id: player.record_id,
                    damage_delta: 0.0,
                    distance_delta: player.unflushed_distance,
                });
            }
            info!(
                player_id = %player_id,
                tag = %player.tag,
                player_count = self.state.players.len(),
                "Player left"
            );
        }
    }

    /// Run a single simulation tick: movement, combat, environment lifecycle
    pub(crate) fn run_tick(&mut self) {
        self.state.tick += 1;

        self.integrate_movement();

        let stats = CombatSystem::resolve(
            &mut self.state.players,
            &mut self.state.environment,
            &self.game,
            &mut self.state.rng,
        );
        self.stats_outbox.extend(stats);

        EnvironmentSystem::maintain(
            &mut self.state.environment,
            &mut self.state.pending_respawns,
            self.state.tick,
            &self.game,
        );
    }

    /// Step each player toward its target, bounded by speed, and accumulate
    /// walked distance from the Euclidean displacement.
    fn integrate_movement(&mut self) {
        let dt = self.game.tick_delta();
        for player in self.state.players.values_mut() {
            let Some((tx, ty)) = player.target else {
                continue;
            };
            let (dx, dy) = (tx - player.x, ty - player.y);
            let dist = (dx * dx + dy * dy).sqrt();
            if dist <= ARRIVE_EPSILON {
                player.target = None;
                continue;
            }

            let speed = if player.charging {
                MOVE_SPEED * CHARGE_SPEED_MULTIPLIER
            } else {
                MOVE_SPEED
            };
            let step = (speed * dt).min(dist);

            player.last_x = player.x;
            player.last_y = player.y;
            player.x += dx / dist * step;
            player.y += dy / dist * step;
            player.direction = dy.atan2(dx);
            player.distance_walked += step;
            player.unflushed_distance += step;

            if step >= dist {
                player.target = None;
            }
        }
    }

    /// Hand persistence deltas to the gateway without awaiting them
    fn flush_stats(&mut self) {
        for update in self.stats_outbox.drain(..) {
            let Some(store) = self.records.clone() else {
                continue;
            };
            tokio::spawn(async move {
                if let Err(e) = store
                    .accumulate_stats(update.record_id, update.damage_delta, update.distance_delta)
                    .await
                {
                    warn!(record_id = %update.record_id, error = %e, "Stats update failed");
                }
            });
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &WorldState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    #[cfg(test)]
    pub(crate) fn outbox(&self) -> &[StatsUpdate] {
        &self.stats_outbox
    }
}
