//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::hub::{HubHandle, HubService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: HubHandle,
}

impl AppState {
    /// Build the state and the hub service that backs it.
    /// The caller is responsible for spawning `HubService::run`.
    pub fn new(config: Config) -> (Self, HubService) {
        let config = Arc::new(config);

        // Initialize hub
        let (hub_service, hub) = HubService::new(config.resolve_seed());

        (Self { config, hub }, hub_service)
    }
}
