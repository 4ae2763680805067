use rand::{SeedableRng, rngs::StdRng};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::GameSettings,
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::lobby_events,
    state::{
        hub::{BroadcastHub, OutboundSender},
        lobby::{ConnectionId, Lobby, RoundAdvance},
        question::Difficulty,
        registry::{LobbyRegistry, normalize_code},
        state_machine::LobbyPhase,
    },
};

/// Work items consumed one at a time by the dispatcher task.
#[derive(Debug)]
pub enum Command {
    /// A WebSocket was accepted and can receive messages.
    Connect {
        /// Connection identifier.
        id: ConnectionId,
        /// Outbound channel drained by the socket writer.
        tx: OutboundSender,
    },
    /// A parsed frame from a connection.
    Inbound {
        /// Sender of the message.
        id: ConnectionId,
        /// Parsed payload.
        message: ClientMessage,
    },
    /// The connection closed.
    Disconnect {
        /// Connection identifier.
        id: ConnectionId,
    },
    /// Auto-advance timer fired for a resolved round.
    AdvanceRound {
        /// Lobby the timer was scheduled for.
        code: String,
        /// Round that was resolved when the timer was armed.
        round: u32,
    },
}

/// Cloneable handle used by socket tasks to feed the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DispatcherHandle {
    /// Register the outbound channel of a new connection.
    pub fn connect(&self, id: ConnectionId, tx: OutboundSender) -> Result<(), ServiceError> {
        self.send(Command::Connect { id, tx })
    }

    /// Queue an inbound message from `id`.
    pub fn dispatch(&self, id: ConnectionId, message: ClientMessage) -> Result<(), ServiceError> {
        self.send(Command::Inbound { id, message })
    }

    /// Queue the departure of `id`.
    pub fn disconnect(&self, id: ConnectionId) -> Result<(), ServiceError> {
        self.send(Command::Disconnect { id })
    }

    /// Whether the dispatcher task is still consuming commands.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.tx.send(command).map_err(|_| ServiceError::Unavailable)
    }
}

/// Spawn the dispatcher task owning every lobby and return a handle to it.
///
/// The task ends once every [`DispatcherHandle`] is dropped.
pub fn spawn_dispatcher(settings: GameSettings) -> DispatcherHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let service = LobbyService::new(settings, tx.downgrade(), StdRng::from_os_rng());
    tokio::spawn(service.run(rx));
    DispatcherHandle { tx }
}

/// Owner of the lobby registry; applies commands strictly sequentially.
pub struct LobbyService {
    registry: LobbyRegistry,
    driver: RoundDriver,
}

/// Everything besides the registry that lobby mutations need: fan-out,
/// randomness, settings and the timer queue.
struct RoundDriver {
    hub: BroadcastHub,
    rng: StdRng,
    settings: GameSettings,
    scheduler: mpsc::WeakUnboundedSender<Command>,
}

impl LobbyService {
    /// Build a dispatcher that schedules round timers through `scheduler`.
    pub fn new(
        settings: GameSettings,
        scheduler: mpsc::WeakUnboundedSender<Command>,
        rng: StdRng,
    ) -> Self {
        Self {
            registry: LobbyRegistry::new(),
            driver: RoundDriver {
                hub: BroadcastHub::new(),
                rng,
                settings,
                scheduler,
            },
        }
    }

    /// Consume commands until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!(
            round_limit = self.driver.settings.round_limit,
            "lobby dispatcher started"
        );
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        info!(lobbies = self.registry.len(), "lobby dispatcher stopped");
    }

    /// Apply a single command.
    pub fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { id, tx } => {
                self.driver.hub.register(id, tx);
                debug!(connection = %id, "connection registered");
            }
            Command::Inbound { id, message } => {
                if let Err(err) = self.handle_message(id, message) {
                    debug!(connection = %id, error = %err, "request rejected");
                    lobby_events::send_error(&self.driver.hub, id, &err);
                }
            }
            Command::Disconnect { id } => self.disconnect(id),
            Command::AdvanceRound { code, round } => self.advance_round(&code, round),
        }
    }

    fn handle_message(
        &mut self,
        id: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), ServiceError> {
        match message {
            ClientMessage::CreateLobby { name, difficulty } => {
                self.create_lobby(id, name.as_deref(), difficulty.as_deref())
            }
            ClientMessage::JoinLobby { code, name } => {
                self.join_lobby(id, code.as_deref(), name.as_deref())
            }
            ClientMessage::StartGame { code } => self.start_game(id, code.as_deref()),
            ClientMessage::SubmitAnswer { code, answer } => {
                self.submit_answer(id, code.as_deref(), &answer)
            }
            ClientMessage::SetDifficulty { code, difficulty } => {
                self.set_difficulty(id, code.as_deref(), difficulty.as_deref())
            }
            ClientMessage::Unknown => Err(ServiceError::InvalidInput(
                "unsupported message type".into(),
            )),
        }
    }

    fn create_lobby(
        &mut self,
        id: ConnectionId,
        name: Option<&str>,
        difficulty: Option<&str>,
    ) -> Result<(), ServiceError> {
        let name = require_name(name)?;
        let difficulty = Difficulty::parse_or_default(difficulty);

        let lobby = self
            .registry
            .create_lobby(&mut self.driver.rng, id, name, difficulty);
        let code = lobby.code().to_string();
        self.driver.hub.join(&code, id);

        lobby_events::broadcast_lobby_update(&self.driver.hub, lobby);
        self.driver.hub.send_to(
            id,
            ServerMessage::LobbyCreated {
                code: code.clone(),
                host: true,
            },
        );
        info!(%code, host = %id, %difficulty, "lobby created");
        Ok(())
    }

    fn join_lobby(
        &mut self,
        id: ConnectionId,
        code: Option<&str>,
        name: Option<&str>,
    ) -> Result<(), ServiceError> {
        let code = require_code(code)?;
        let lobby = self.registry.lookup_mut(&code)?;
        let name = require_name(name)?;

        let joined = lobby.add_player(id, name);
        self.driver.hub.join(lobby.code(), id);

        lobby_events::broadcast_lobby_update(&self.driver.hub, lobby);
        self.driver.hub.send_to(
            id,
            ServerMessage::LobbyJoined {
                code: lobby.code().to_string(),
                host: lobby.is_host(id),
            },
        );
        info!(
            code = lobby.code(),
            connection = %id,
            rejoined = !joined,
            players = lobby.player_count(),
            "player joined lobby"
        );
        if joined && let LobbyPhase::RoundActive { round } = lobby.phase() {
            warn!(
                code = lobby.code(),
                connection = %id,
                round,
                "player joined mid-round; the round waits for their answer"
            );
        }
        Ok(())
    }

    fn start_game(&mut self, id: ConnectionId, code: Option<&str>) -> Result<(), ServiceError> {
        let code = require_code(code)?;
        let lobby = self.registry.lookup_mut(&code)?;
        if !lobby.is_host(id) {
            return Err(ServiceError::Unauthorized(
                "only the host can start the game".into(),
            ));
        }
        self.driver.advance(lobby)
    }

    fn submit_answer(
        &mut self,
        id: ConnectionId,
        code: Option<&str>,
        answer: &Value,
    ) -> Result<(), ServiceError> {
        let code = require_code(code)?;
        let lobby = self.registry.lookup_mut(&code)?;
        let outcome = lobby.submit_answer(id, answer)?;
        debug!(
            code = lobby.code(),
            connection = %id,
            value = lobby.answer(id).map_or(f64::NAN, |answer| answer.value),
            correct = outcome.correct,
            "answer recorded"
        );

        lobby_events::send_answer_result(&self.driver.hub, id, outcome);
        if lobby.is_round_complete() {
            self.driver.complete(lobby)?;
        }
        Ok(())
    }

    fn set_difficulty(
        &mut self,
        id: ConnectionId,
        code: Option<&str>,
        difficulty: Option<&str>,
    ) -> Result<(), ServiceError> {
        let code = require_code(code)?;
        let lobby = self.registry.lookup_mut(&code)?;
        if !lobby.is_host(id) {
            return Err(ServiceError::Unauthorized(
                "only the host can change difficulty".into(),
            ));
        }

        let difficulty = Difficulty::parse_or_default(difficulty);
        lobby.set_difficulty(difficulty);
        lobby_events::broadcast_lobby_update(&self.driver.hub, lobby);
        info!(code = lobby.code(), %difficulty, "difficulty changed");
        Ok(())
    }

    fn disconnect(&mut self, id: ConnectionId) {
        for code in self.registry.lobbies_with(id) {
            let closed = {
                let Ok(lobby) = self.registry.lookup_mut(&code) else {
                    continue;
                };
                let departure = lobby.remove_player(id);
                self.driver.hub.leave(&code, id);
                if !departure.removed {
                    continue;
                }
                info!(%code, connection = %id, "player left lobby");

                if let Some(new_host) = departure.promoted {
                    lobby_events::send_host_promotion(&self.driver.hub, new_host);
                    info!(%code, host = %new_host, "host promoted");
                }

                if lobby.is_empty() {
                    true
                } else {
                    lobby_events::broadcast_lobby_update(&self.driver.hub, lobby);
                    if lobby.is_round_complete()
                        && let Err(err) = self.driver.complete(lobby)
                    {
                        warn!(%code, error = %err, "failed to resolve round after departure");
                    }
                    false
                }
            };

            if closed {
                self.registry.remove(&code);
                self.driver.hub.drop_group(&code);
                info!(%code, "lobby closed");
            }
        }

        self.driver.hub.unregister(id);
        debug!(connection = %id, "connection unregistered");
    }

    fn advance_round(&mut self, code: &str, round: u32) {
        let Ok(lobby) = self.registry.lookup_mut(code) else {
            debug!(%code, round, "ignoring round timer for closed lobby");
            return;
        };
        if lobby.phase() != (LobbyPhase::RoundResolved { round }) {
            debug!(%code, round, phase = ?lobby.phase(), "ignoring stale round timer");
            return;
        }
        if let Err(err) = self.driver.advance(lobby) {
            warn!(%code, round, error = %err, "failed to advance round");
        }
    }
}

impl RoundDriver {
    /// Start the next round, or end the game at the round limit, and tell the lobby.
    fn advance(&mut self, lobby: &mut Lobby) -> Result<(), ServiceError> {
        match lobby.advance(self.settings.round_limit, &mut self.rng)? {
            RoundAdvance::Started { round } => {
                lobby_events::broadcast_lobby_update(&self.hub, lobby);
                lobby_events::broadcast_new_question(&self.hub, lobby, self.settings.round_limit);
                info!(code = lobby.code(), round, "round started");
            }
            RoundAdvance::Finished => {
                lobby_events::broadcast_game_over(&self.hub, lobby);
                info!(code = lobby.code(), rounds = lobby.round(), "game over");
            }
        }
        Ok(())
    }

    /// Resolve the running round, broadcast results and arm the auto-advance timer.
    fn complete(&mut self, lobby: &mut Lobby) -> Result<(), ServiceError> {
        let resolved = lobby.resolve_round()?;
        lobby_events::broadcast_round_results(&self.hub, lobby, resolved);
        info!(code = lobby.code(), round = resolved.round, "round resolved");
        self.schedule_advance(lobby.code().to_string(), resolved.round);
        Ok(())
    }

    fn schedule_advance(&self, code: String, round: u32) {
        let scheduler = self.scheduler.clone();
        let delay = self.settings.round_advance_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = scheduler.upgrade() {
                let _ = tx.send(Command::AdvanceRound { code, round });
            }
        });
    }
}

fn require_name(raw: Option<&str>) -> Result<String, ServiceError> {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(ServiceError::InvalidInput("name is required".into())),
    }
}

fn require_code(raw: Option<&str>) -> Result<String, ServiceError> {
    match raw.map(normalize_code) {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err(ServiceError::InvalidInput("lobby code is required".into())),
    }
}
