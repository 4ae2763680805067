use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::lobby::Player;

/// Public view of a player inside lobby-wide events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Connection identifier of the player.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current score.
    pub score: u32,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            score: player.score,
        }
    }
}

impl From<Player> for PlayerSummary {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            name: player.name,
            score: player.score,
        }
    }
}
