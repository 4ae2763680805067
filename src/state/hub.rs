use std::collections::HashMap;

use indexmap::IndexSet;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{dto::ws::ServerMessage, state::lobby::ConnectionId};

/// Outbound half of a player connection.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// Fan-out hub tracking connection channels and per-lobby broadcast groups.
///
/// Groups are kept in lockstep with lobby membership by the dispatcher, so a
/// broadcast reaches exactly the players present when it is issued.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    connections: HashMap<ConnectionId, OutboundSender>,
    groups: HashMap<String, IndexSet<ConnectionId>>,
}

impl BroadcastHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the outbound channel of a freshly accepted connection.
    pub fn register(&mut self, id: ConnectionId, tx: OutboundSender) {
        self.connections.insert(id, tx);
    }

    /// Forget a connection's channel once it is gone.
    pub fn unregister(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    /// Add `id` to the broadcast group of `code`.
    pub fn join(&mut self, code: &str, id: ConnectionId) {
        self.groups.entry(code.to_string()).or_default().insert(id);
    }

    /// Remove `id` from the broadcast group of `code`.
    pub fn leave(&mut self, code: &str, id: ConnectionId) {
        if let Some(group) = self.groups.get_mut(code) {
            group.shift_remove(&id);
        }
    }

    /// Drop the whole group of a deleted lobby.
    pub fn drop_group(&mut self, code: &str) {
        self.groups.remove(code);
    }

    /// Members of a group in join order.
    pub fn members(&self, code: &str) -> Vec<ConnectionId> {
        self.groups
            .get(code)
            .map(|group| group.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Deliver `message` to every member of `code`, returning how many received it.
    pub fn broadcast(&self, code: &str, message: &ServerMessage) -> usize {
        let Some(group) = self.groups.get(code) else {
            return 0;
        };
        group
            .iter()
            .filter(|id| self.send_to(**id, message.clone()))
            .count()
    }

    /// Deliver a private message to a single connection.
    ///
    /// Returns `false` when the connection is unknown or its writer already closed.
    pub fn send_to(&self, id: ConnectionId, message: ServerMessage) -> bool {
        let Some(tx) = self.connections.get(&id) else {
            debug!(connection = %id, "dropping message for unregistered connection");
            return false;
        };
        if tx.send(message).is_err() {
            debug!(connection = %id, "dropping message for closed connection");
            return false;
        }
        true
    }
}
