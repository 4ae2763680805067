use indexmap::IndexMap;
use rand::Rng;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{
        question::{self, Difficulty, Question},
        state_machine::{LobbyEvent, LobbyPhase, LobbyStateMachine},
    },
};

/// Ephemeral identifier handed to every WebSocket connection.
pub type ConnectionId = Uuid;

/// Points awarded for each correct answer.
pub const POINTS_PER_CORRECT_ANSWER: u32 = 10;

/// Player info tracked for the lifetime of a connection inside a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Connection identifier of the player.
    pub id: ConnectionId,
    /// Display name, trimmed but otherwise as supplied.
    pub name: String,
    /// Current score.
    pub score: u32,
}

impl Player {
    /// Fresh player with a zero score.
    pub fn new(id: ConnectionId, name: String) -> Self {
        Self { id, name, score: 0 }
    }
}

/// A recorded submission for the running round.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Submitter's connection identifier.
    pub id: ConnectionId,
    /// Parsed value; NaN when the raw input could not be read as a number.
    pub value: f64,
    /// Whether the value matched the round's answer at submission time.
    pub correct: bool,
}

/// What the submitter learns about their own answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// Whether the submission was correct.
    pub correct: bool,
    /// The round's exact answer, revealed to every submitter.
    pub correct_answer: i64,
}

/// Outcome of driving a lobby to its next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundAdvance {
    /// A new round started with a fresh question.
    Started {
        /// Number of the round that just started.
        round: u32,
    },
    /// The round limit was reached and the lobby is now over.
    Finished,
}

/// Results captured when the running round resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRound {
    /// Number of the resolved round.
    pub round: u32,
    /// The round's exact answer.
    pub correct_answer: i64,
}

/// Membership changes caused by a player leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Departure {
    /// Whether the connection was a member at all.
    pub removed: bool,
    /// New host when the leaving player held the role and someone remains.
    pub promoted: Option<ConnectionId>,
}

/// A group of players sharing one game session and code.
#[derive(Debug, Clone)]
pub struct Lobby {
    code: String,
    host_id: Option<ConnectionId>,
    players: IndexMap<ConnectionId, Player>,
    difficulty: Difficulty,
    current_question: Option<Question>,
    answers: IndexMap<ConnectionId, Answer>,
    machine: LobbyStateMachine,
}

impl Lobby {
    /// Build a lobby whose only member is `host`.
    pub fn new(code: String, host: Player, difficulty: Difficulty) -> Self {
        let host_id = host.id;
        let mut players = IndexMap::new();
        players.insert(host_id, host);

        Self {
            code,
            host_id: Some(host_id),
            players,
            difficulty,
            current_question: None,
            answers: IndexMap::new(),
            machine: LobbyStateMachine::new(),
        }
    }

    /// Uppercase lobby code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Connection currently holding the host role.
    pub fn host_id(&self) -> Option<ConnectionId> {
        self.host_id
    }

    /// Whether `id` is the current host.
    pub fn is_host(&self, id: ConnectionId) -> bool {
        self.host_id == Some(id)
    }

    /// Whether `id` is a current member.
    pub fn is_member(&self, id: ConnectionId) -> bool {
        self.players.contains_key(&id)
    }

    /// Members in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Look up a single member.
    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Number of current members.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether every member has left.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Tier used for the next generated question.
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Change the tier for future rounds; a pending question is left as is.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LobbyPhase {
        self.machine.phase()
    }

    /// Round counter, `0` before the game starts.
    pub fn round(&self) -> u32 {
        self.machine.phase().round()
    }

    /// Pending question, present only while a round is unresolved.
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    /// Number of answers recorded this round.
    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    /// Recorded answer of `id` for the running round.
    pub fn answer(&self, id: ConnectionId) -> Option<&Answer> {
        self.answers.get(&id)
    }

    /// Add a member at score zero, or refresh the name of an existing one.
    ///
    /// Returns `true` when the connection was not a member before.
    pub fn add_player(&mut self, id: ConnectionId, name: String) -> bool {
        if let Some(existing) = self.players.get_mut(&id) {
            existing.name = name;
            return false;
        }
        self.players.insert(id, Player::new(id, name));
        true
    }

    /// Remove a member and its pending answer, handing the host role to the
    /// earliest remaining joiner when needed.
    pub fn remove_player(&mut self, id: ConnectionId) -> Departure {
        if self.players.shift_remove(&id).is_none() {
            return Departure::default();
        }
        self.answers.shift_remove(&id);

        let mut promoted = None;
        if self.host_id == Some(id) {
            self.host_id = self.players.keys().next().copied();
            promoted = self.host_id;
        }

        Departure {
            removed: true,
            promoted,
        }
    }

    /// Start the next round or end the game once `round_limit` rounds were played.
    pub fn advance<R: Rng>(
        &mut self,
        round_limit: u32,
        rng: &mut R,
    ) -> Result<RoundAdvance, ServiceError> {
        if let LobbyPhase::RoundResolved { round } = self.phase()
            && round >= round_limit
        {
            self.machine.apply(LobbyEvent::Finish)?;
            return Ok(RoundAdvance::Finished);
        }

        let LobbyPhase::RoundActive { round } = self.machine.apply(LobbyEvent::StartRound)? else {
            return Err(ServiceError::InvalidState(
                "round did not start after transition".into(),
            ));
        };
        self.answers.clear();
        self.current_question = Some(question::generate(self.difficulty, rng));
        Ok(RoundAdvance::Started { round })
    }

    /// Record `raw` as the answer of `id` for the running round.
    ///
    /// A correct answer adds [`POINTS_PER_CORRECT_ANSWER`] to the player's score.
    /// Later submissions for the same round are rejected rather than overwritten.
    pub fn submit_answer(
        &mut self,
        id: ConnectionId,
        raw: &Value,
    ) -> Result<AnswerOutcome, ServiceError> {
        if !self.players.contains_key(&id) {
            return Err(ServiceError::NotMember(self.code.clone()));
        }
        let Some(question) = self.current_question.as_ref() else {
            return Err(ServiceError::NoActiveQuestion);
        };
        if self.answers.contains_key(&id) {
            return Err(ServiceError::DuplicateSubmission(self.round()));
        }

        let correct_answer = question.answer;
        let value = parse_answer(raw);
        let correct = value.is_finite() && value == correct_answer as f64;

        if correct && let Some(player) = self.players.get_mut(&id) {
            player.score += POINTS_PER_CORRECT_ANSWER;
        }
        self.answers.insert(id, Answer { id, value, correct });

        Ok(AnswerOutcome {
            correct,
            correct_answer,
        })
    }

    /// Whether the running round has one answer per current member.
    pub fn is_round_complete(&self) -> bool {
        matches!(self.phase(), LobbyPhase::RoundActive { .. })
            && !self.players.is_empty()
            && self.answers.len() >= self.players.len()
    }

    /// Close the running round and discard its question.
    pub fn resolve_round(&mut self) -> Result<ResolvedRound, ServiceError> {
        let LobbyPhase::RoundResolved { round } = self.machine.apply(LobbyEvent::AllAnswered)? else {
            return Err(ServiceError::InvalidState(
                "round did not resolve after transition".into(),
            ));
        };
        let question = self
            .current_question
            .take()
            .ok_or(ServiceError::NoActiveQuestion)?;

        Ok(ResolvedRound {
            round,
            correct_answer: question.answer,
        })
    }

    /// Members sorted by score descending, ties kept in join order.
    pub fn leaderboard(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }
}

/// Read a submitted answer as a number.
///
/// JSON numbers are taken as is, strings are trimmed and parsed. Anything that
/// does not yield a finite number, blank strings included, becomes NaN and is
/// therefore scored as incorrect.
pub fn parse_answer(raw: &Value) -> f64 {
    let value = match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|value| value.is_finite()).unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use serde_json::json;

    use super::*;

    fn lobby_with(names: &[&str]) -> (Lobby, Vec<ConnectionId>) {
        let ids: Vec<ConnectionId> = names.iter().map(|_| Uuid::new_v4()).collect();
        let mut lobby = Lobby::new(
            "ABCDE".into(),
            Player::new(ids[0], names[0].into()),
            Difficulty::Easy,
        );
        for (id, name) in ids.iter().zip(names).skip(1) {
            lobby.add_player(*id, (*name).into());
        }
        (lobby, ids)
    }

    fn started(lobby: &mut Lobby) -> i64 {
        let mut rng = StdRng::seed_from_u64(1);
        lobby.advance(10, &mut rng).unwrap();
        lobby.current_question().unwrap().answer
    }

    #[test]
    fn host_leaving_promotes_earliest_joiner() {
        let (mut lobby, ids) = lobby_with(&["host", "ana", "bo"]);

        let departure = lobby.remove_player(ids[0]);
        assert!(departure.removed);
        assert_eq!(departure.promoted, Some(ids[1]));
        assert_eq!(lobby.host_id(), Some(ids[1]));
        assert!(lobby.is_member(ids[1]));
    }

    #[test]
    fn non_host_leaving_keeps_host() {
        let (mut lobby, ids) = lobby_with(&["host", "ana"]);

        let departure = lobby.remove_player(ids[1]);
        assert_eq!(departure.promoted, None);
        assert_eq!(lobby.host_id(), Some(ids[0]));

        assert_eq!(lobby.remove_player(ids[1]), Departure::default());
    }

    #[test]
    fn last_player_leaving_clears_host() {
        let (mut lobby, ids) = lobby_with(&["solo"]);
        let departure = lobby.remove_player(ids[0]);
        assert_eq!(departure.promoted, None);
        assert!(lobby.is_empty());
        assert_eq!(lobby.host_id(), None);
    }

    #[test]
    fn rejoining_keeps_score_and_order() {
        let (mut lobby, ids) = lobby_with(&["host", "ana"]);
        let answer = started(&mut lobby);
        lobby.submit_answer(ids[1], &json!(answer)).unwrap();

        assert!(!lobby.add_player(ids[1], "Ana B.".into()));
        let player = lobby.player(ids[1]).unwrap();
        assert_eq!(player.name, "Ana B.");
        assert_eq!(player.score, POINTS_PER_CORRECT_ANSWER);
        assert_eq!(lobby.players().last().unwrap().id, ids[1]);
    }

    #[test]
    fn correct_answer_scores_and_wrong_answer_does_not() {
        let (mut lobby, ids) = lobby_with(&["host", "ana"]);
        let answer = started(&mut lobby);

        let outcome = lobby.submit_answer(ids[0], &json!(answer)).unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome {
                correct: true,
                correct_answer: answer
            }
        );
        let outcome = lobby
            .submit_answer(ids[1], &json!((answer + 1).to_string()))
            .unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.correct_answer, answer);

        assert_eq!(lobby.player(ids[0]).unwrap().score, 10);
        assert_eq!(lobby.player(ids[1]).unwrap().score, 0);
        assert!(lobby.is_round_complete());
    }

    #[test]
    fn duplicate_submission_is_rejected_without_side_effects() {
        let (mut lobby, ids) = lobby_with(&["host", "ana"]);
        let answer = started(&mut lobby);

        lobby.submit_answer(ids[0], &json!(answer)).unwrap();
        let err = lobby.submit_answer(ids[0], &json!(answer)).unwrap_err();
        assert_eq!(err, ServiceError::DuplicateSubmission(1));
        assert_eq!(lobby.player(ids[0]).unwrap().score, 10);
        assert_eq!(lobby.answer_count(), 1);
    }

    #[test]
    fn submission_errors_are_checked_in_order() {
        let (mut lobby, ids) = lobby_with(&["host"]);
        let stranger = Uuid::new_v4();

        assert_eq!(
            lobby.submit_answer(stranger, &json!(1)).unwrap_err(),
            ServiceError::NotMember("ABCDE".into())
        );
        assert_eq!(
            lobby.submit_answer(ids[0], &json!(1)).unwrap_err(),
            ServiceError::NoActiveQuestion
        );
    }

    #[test]
    fn departure_drops_pending_answer() {
        let (mut lobby, ids) = lobby_with(&["host", "ana", "bo"]);
        let answer = started(&mut lobby);
        lobby.submit_answer(ids[2], &json!(answer)).unwrap();
        lobby.submit_answer(ids[0], &json!(answer)).unwrap();

        lobby.remove_player(ids[2]);
        assert_eq!(lobby.answer_count(), 1);
        assert!(lobby.answer(ids[2]).is_none());
        assert!(!lobby.is_round_complete());

        lobby.remove_player(ids[1]);
        assert!(lobby.is_round_complete());
    }

    #[test]
    fn resolving_discards_question_and_advancing_clears_answers() {
        let (mut lobby, ids) = lobby_with(&["host"]);
        let answer = started(&mut lobby);
        lobby.submit_answer(ids[0], &json!(answer)).unwrap();

        let resolved = lobby.resolve_round().unwrap();
        assert_eq!(resolved.round, 1);
        assert_eq!(resolved.correct_answer, answer);
        assert!(lobby.current_question().is_none());
        assert_eq!(
            lobby.submit_answer(ids[0], &json!(answer)).unwrap_err(),
            ServiceError::NoActiveQuestion
        );

        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            lobby.advance(10, &mut rng).unwrap(),
            RoundAdvance::Started { round: 2 }
        );
        assert_eq!(lobby.answer_count(), 0);
        assert!(lobby.current_question().is_some());
    }

    #[test]
    fn advance_finishes_at_round_limit() {
        let (mut lobby, ids) = lobby_with(&["host"]);
        let mut rng = StdRng::seed_from_u64(9);
        lobby.advance(1, &mut rng).unwrap();
        let answer = lobby.current_question().unwrap().answer;
        lobby.submit_answer(ids[0], &json!(answer)).unwrap();
        lobby.resolve_round().unwrap();

        assert_eq!(lobby.advance(1, &mut rng).unwrap(), RoundAdvance::Finished);
        assert_eq!(lobby.phase(), LobbyPhase::GameOver { round: 1 });
        assert_eq!(
            lobby.advance(1, &mut rng).unwrap_err(),
            ServiceError::InvalidState("game is over".into())
        );
    }

    #[test]
    fn advance_rejected_while_round_is_running() {
        let (mut lobby, _) = lobby_with(&["host"]);
        started(&mut lobby);
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            lobby.advance(10, &mut rng).unwrap_err(),
            ServiceError::InvalidState("round 1 is still in progress".into())
        );
        assert_eq!(lobby.round(), 1);
    }

    #[test]
    fn leaderboard_is_sorted_and_stable() {
        let (mut lobby, ids) = lobby_with(&["host", "ana", "bo", "cy"]);
        let answer = started(&mut lobby);
        lobby.submit_answer(ids[2], &json!(answer)).unwrap();
        lobby.submit_answer(ids[3], &json!(answer)).unwrap();

        let board = lobby.leaderboard();
        let order: Vec<ConnectionId> = board.iter().map(|player| player.id).collect();
        assert_eq!(order, vec![ids[2], ids[3], ids[0], ids[1]]);
        assert!(board.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn answers_parse_leniently() {
        assert_eq!(parse_answer(&json!(42)), 42.0);
        assert_eq!(parse_answer(&json!(-7)), -7.0);
        assert_eq!(parse_answer(&json!(" 12 ")), 12.0);
        assert_eq!(parse_answer(&json!("3.5")), 3.5);
        assert!(parse_answer(&json!("twelve")).is_nan());
        assert!(parse_answer(&json!("   ")).is_nan());
        assert!(parse_answer(&json!(null)).is_nan());
        assert!(parse_answer(&json!(true)).is_nan());
        assert!(parse_answer(&json!([1])).is_nan());
        assert!(parse_answer(&json!("1e400")).is_nan());
        assert!(parse_answer(&json!("-inf")).is_nan());
    }

    #[test]
    fn non_finite_input_is_never_correct() {
        let (mut lobby, ids) = lobby_with(&["host"]);
        started(&mut lobby);
        let outcome = lobby.submit_answer(ids[0], &json!("inf")).unwrap();
        assert!(!outcome.correct);
        assert_eq!(lobby.player(ids[0]).unwrap().score, 0);
    }
}
