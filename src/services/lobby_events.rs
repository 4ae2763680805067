use tracing::debug;

use crate::{
    dto::{lobby::PlayerSummary, ws::ServerMessage},
    error::ServiceError,
    state::{
        hub::BroadcastHub,
        lobby::{AnswerOutcome, ConnectionId, Lobby, ResolvedRound},
    },
};

/// Broadcast the canonical lobby snapshot with live scores.
pub fn broadcast_lobby_update(hub: &BroadcastHub, lobby: &Lobby) {
    let message = ServerMessage::LobbyUpdate {
        code: lobby.code().to_string(),
        round: lobby.round(),
        difficulty: lobby.difficulty(),
        players: lobby.players().map(PlayerSummary::from).collect(),
    };
    send_lobby_event(hub, lobby, message);
}

/// Announce the pending question of the running round.
pub fn broadcast_new_question(hub: &BroadcastHub, lobby: &Lobby, round_limit: u32) {
    let Some(question) = lobby.current_question() else {
        debug!(code = lobby.code(), "no pending question to announce");
        return;
    };
    let message = ServerMessage::NewQuestion {
        prompt: question.prompt(),
        round: lobby.round(),
        remaining_rounds: round_limit.saturating_sub(lobby.round()),
    };
    send_lobby_event(hub, lobby, message);
}

/// Broadcast the outcome of a resolved round with the sorted leaderboard.
pub fn broadcast_round_results(hub: &BroadcastHub, lobby: &Lobby, resolved: ResolvedRound) {
    let message = ServerMessage::RoundResults {
        round: resolved.round,
        correct_answer: resolved.correct_answer,
        players: leaderboard(lobby),
    };
    send_lobby_event(hub, lobby, message);
}

/// Broadcast the final standings.
pub fn broadcast_game_over(hub: &BroadcastHub, lobby: &Lobby) {
    let message = ServerMessage::GameOver {
        players: leaderboard(lobby),
    };
    send_lobby_event(hub, lobby, message);
}

/// Tell a submitter whether their answer was right, along with the correct value.
pub fn send_answer_result(hub: &BroadcastHub, id: ConnectionId, outcome: AnswerOutcome) {
    hub.send_to(
        id,
        ServerMessage::AnswerResult {
            correct: outcome.correct,
            correct_answer: outcome.correct_answer,
        },
    );
}

/// Notify a connection that it now hosts its lobby.
pub fn send_host_promotion(hub: &BroadcastHub, id: ConnectionId) {
    hub.send_to(id, ServerMessage::HostPromotion);
}

/// Report a rejected request to its sender only.
pub fn send_error(hub: &BroadcastHub, id: ConnectionId, err: &ServiceError) {
    hub.send_to(id, ServerMessage::from(err));
}

fn leaderboard(lobby: &Lobby) -> Vec<PlayerSummary> {
    lobby
        .leaderboard()
        .into_iter()
        .map(PlayerSummary::from)
        .collect()
}

fn send_lobby_event(hub: &BroadcastHub, lobby: &Lobby, message: ServerMessage) {
    let delivered = hub.broadcast(lobby.code(), &message);
    debug!(code = lobby.code(), delivered, "lobby event sent");
}
