pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::fanout::ProjectBroadcast;
use gateway::hub::SignalHub;
use gateway::transport::ConnectionTable;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<SignalHub>,
    pub connections: Arc<ConnectionTable>,
    pub broadcast: Arc<ProjectBroadcast>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let hub = SignalHub::new(config.enforce_single_room);
        Self {
            config: Arc::new(config),
            hub: Arc::new(hub),
            connections: Arc::new(ConnectionTable::new()),
            broadcast: Arc::new(ProjectBroadcast::new()),
        }
    }
}
