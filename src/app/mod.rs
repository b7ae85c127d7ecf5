//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::game::{SessionRegistry, WorldHandle};
use crate::store::RecordStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub records: RecordStore,
    pub world: WorldHandle,
    pub sessions: Arc<SessionRegistry>,
    /// Flips to true when the process is shutting down; sessions watch it
    /// so open sockets close instead of pinning the server alive.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        config: Config,
        world: WorldHandle,
        records: RecordStore,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            records,
            world,
            sessions: Arc::new(SessionRegistry::new()),
            shutdown,
        }
    }
}
