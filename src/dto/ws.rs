use serde::{Deserialize, Serialize};
use serde_json::{Value, value::RawValue};
use utoipa::ToSchema;

use crate::{
    dto::lobby::PlayerSummary,
    error::ServiceError,
    state::question::Difficulty,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
///
/// Frames are read through [`ClientMessage::from_json_str`], which keeps the
/// raw answer so out-of-range numbers are scored instead of failing the frame.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Open a new lobby hosted by the sender.
    CreateLobby {
        name: Option<String>,
        difficulty: Option<String>,
    },
    /// Enter an existing lobby.
    JoinLobby {
        code: Option<String>,
        name: Option<String>,
    },
    /// Host-only: start the first or next round.
    StartGame { code: Option<String> },
    /// Answer the pending question; numbers and numeric strings are accepted.
    SubmitAnswer {
        code: Option<String>,
        answer: Value,
    },
    /// Host-only: change the tier used for future rounds.
    SetDifficulty {
        code: Option<String>,
        difficulty: Option<String>,
    },
    /// Any unrecognised `type`.
    Unknown,
}

/// Flat view of an inbound frame; every field is optional except `type`.
#[derive(Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    kind: String,
    code: Option<String>,
    name: Option<String>,
    difficulty: Option<String>,
    answer: Option<Box<RawValue>>,
}

impl ClientMessage {
    /// Parse a text frame.
    ///
    /// An answer that is not representable as a JSON value (e.g. `1e400`)
    /// becomes `null` and is scored as incorrect.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        let frame: ClientFrame = serde_json::from_str(text)?;
        let message = match frame.kind.as_str() {
            "createLobby" => ClientMessage::CreateLobby {
                name: frame.name,
                difficulty: frame.difficulty,
            },
            "joinLobby" => ClientMessage::JoinLobby {
                code: frame.code,
                name: frame.name,
            },
            "startGame" => ClientMessage::StartGame { code: frame.code },
            "submitAnswer" => ClientMessage::SubmitAnswer {
                code: frame.code,
                answer: frame
                    .answer
                    .and_then(|raw| serde_json::from_str(raw.get()).ok())
                    .unwrap_or(Value::Null),
            },
            "setDifficulty" => ClientMessage::SetDifficulty {
                code: frame.code,
                difficulty: frame.difficulty,
            },
            _ => ClientMessage::Unknown,
        };
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Events pushed to player WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Private: the sender's lobby was created.
    LobbyCreated { code: String, host: bool },
    /// Private: the sender joined a lobby.
    LobbyJoined { code: String, host: bool },
    /// Lobby-wide snapshot with live scores, players in join order.
    LobbyUpdate {
        code: String,
        round: u32,
        difficulty: Difficulty,
        players: Vec<PlayerSummary>,
    },
    /// Private: the receiver became host after the previous host left.
    HostPromotion,
    /// Lobby-wide announcement of a new round.
    #[serde(rename_all = "camelCase")]
    NewQuestion {
        prompt: String,
        round: u32,
        remaining_rounds: u32,
    },
    /// Private: verdict on the receiver's own answer.
    #[serde(rename_all = "camelCase")]
    AnswerResult { correct: bool, correct_answer: i64 },
    /// Lobby-wide results once every player answered.
    #[serde(rename_all = "camelCase")]
    RoundResults {
        round: u32,
        correct_answer: i64,
        players: Vec<PlayerSummary>,
    },
    /// Lobby-wide final standings.
    GameOver { players: Vec<PlayerSummary> },
    /// Private: the receiver's last request was rejected.
    ErrorMessage { text: String },
}

impl From<&ServiceError> for ServerMessage {
    fn from(err: &ServiceError) -> Self {
        ServerMessage::ErrorMessage {
            text: err.to_string(),
        }
    }
}
