use thiserror::Error;

use crate::state::state_machine::{InvalidTransition, LobbyPhase};

/// Errors raised while handling a player request.
///
/// Every variant is local to the offending request: the dispatcher reports it
/// privately to the sender as an `errorMessage` and leaves shared state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Missing or blank field in the request payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested lobby does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Host-only action attempted by another player.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Sender has not joined the targeted lobby.
    #[error("you are not part of lobby `{0}`")]
    NotMember(String),
    /// No question is pending in the targeted lobby.
    #[error("no active question")]
    NoActiveQuestion,
    /// Sender already answered the current round.
    #[error("answer already submitted for round {0}")]
    DuplicateSubmission(u32),
    /// Operation cannot be performed in the current lobby phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The lobby dispatcher task is no longer running.
    #[error("lobby dispatcher unavailable")]
    Unavailable,
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        match err.from {
            LobbyPhase::RoundActive { round } => {
                ServiceError::InvalidState(format!("round {round} is still in progress"))
            }
            LobbyPhase::GameOver { .. } => ServiceError::InvalidState("game is over".into()),
            _ => ServiceError::InvalidState(err.to_string()),
        }
    }
}
