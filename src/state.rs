use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Config;
use crate::presence::PresenceCoordinator;
use crate::redis::UserRepository;
use crate::ws::ConnectionsManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserRepository>,
    pub connections: Arc<ConnectionsManager>,
    pub presence: Arc<PresenceCoordinator>,
}

impl AppState {
    pub fn new(config: Config, auth: AuthService, users: UserRepository) -> Self {
        let connections = Arc::new(ConnectionsManager::new());
        let presence = Arc::new(PresenceCoordinator::new(connections.clone()));
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            users: Arc::new(users),
            connections,
            presence,
        }
    }
}
