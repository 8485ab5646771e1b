use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::LobbyPhase;
use crate::websockets::PlayerSummary;

/// Request payload for creating a new lobby
#[derive(Debug, Deserialize)]
pub struct CreateLobbyRequest {
    pub name: String,
    /// Display name of the creator, who becomes host
    pub nickname: String,
    /// Defaults to the configured game type
    pub game_type: Option<String>,
}

/// Request payload for joining a lobby
#[derive(Debug, Deserialize)]
pub struct JoinLobbyRequest {
    pub nickname: String,
}

/// Response for lobby creation and lobby information
#[derive(Debug, Serialize, Deserialize)]
pub struct LobbyResponse {
    pub code: String,
    pub name: String,
    pub game_type: String,
    pub phase: LobbyPhase,
    pub players: Vec<PlayerSummary>,
    pub created_at: DateTime<Utc>,
}
