//! Game simulation modules

pub mod combat;
pub mod environment;
pub mod session;
pub mod snapshot;
pub mod world;

pub use session::SessionRegistry;
pub use world::{GameWorld, PlayerState, WorldHandle};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Client event routed into the world task
#[derive(Debug)]
pub enum WorldEvent {
    /// Join with an already-resolved persisted identity; the world answers
    /// with the init frame on the oneshot
    Join {
        player_id: Uuid,
        record_id: Uuid,
        tag: String,
        init_tx: oneshot::Sender<ServerMsg>,
    },
    /// Absolute movement target
    Move { player_id: Uuid, x: f32, y: f32 },
    /// Toggle charging
    Charge { player_id: Uuid, active: bool },
    /// Leave the world (also sent on connection loss)
    Leave { player_id: Uuid },
}

/// Persistence delta handed to the gateway fire-and-forget
#[derive(Debug, Clone, Copy)]
pub struct StatsUpdate {
    pub record_id: Uuid,
    pub damage_delta: f32,
    pub distance_delta: f32,
}
