pub mod hub;
pub mod lobby;
pub mod question;
pub mod registry;
pub mod state_machine;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    services::lobby_service::{self, DispatcherHandle},
};

/// Reference-counted handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central application state shared by every HTTP and WebSocket handler.
///
/// Lobby data itself is owned by the dispatcher task; handlers only hold a
/// handle to its command queue.
pub struct AppState {
    config: AppConfig,
    dispatcher: DispatcherHandle,
}

impl AppState {
    /// Spawn the lobby dispatcher and wrap the state in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: AppConfig) -> SharedState {
        let dispatcher = lobby_service::spawn_dispatcher(config.game);
        Arc::new(Self { config, dispatcher })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle feeding the lobby dispatcher.
    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }
}
