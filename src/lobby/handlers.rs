use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use super::types::{CreateLobbyRequest, JoinLobbyRequest, LobbyResponse};
use crate::games::GameInfo;
use crate::identity::PlayerIdentity;
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new lobby
///
/// POST /lobbies
#[instrument(name = "create_lobby", skip(state, request))]
pub async fn create_lobby(
    State(state): State<AppState>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(request): Json<CreateLobbyRequest>,
) -> Result<Json<LobbyResponse>, AppError> {
    let lobby = state.lobby_service.create_lobby(player_id, request).await?;
    Ok(Json(lobby))
}

/// GET /lobbies
#[instrument(name = "list_lobbies", skip(state))]
pub async fn list_lobbies(
    State(state): State<AppState>,
) -> Result<Json<Vec<LobbyResponse>>, AppError> {
    let lobbies = state.lobby_service.list_lobbies().await?;
    info!(lobby_count = lobbies.len(), "Lobbies listed");
    Ok(Json(lobbies))
}

/// GET /lobbies/:code
#[instrument(name = "get_lobby", skip(state))]
pub async fn get_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LobbyResponse>, AppError> {
    Ok(Json(state.lobby_service.get_lobby(&code).await?))
}

/// POST /lobbies/:code/join
#[instrument(name = "join_lobby", skip(state, request))]
pub async fn join_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(request): Json<JoinLobbyRequest>,
) -> Result<Json<LobbyResponse>, AppError> {
    let lobby = state
        .lobby_service
        .join_lobby(&code, player_id, request)
        .await?;
    Ok(Json(lobby))
}

/// POST /lobbies/:code/leave
#[instrument(name = "leave_lobby", skip(state))]
pub async fn leave_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<LobbyResponse>, AppError> {
    Ok(Json(state.lobby_service.leave_lobby(&code, player_id).await?))
}

/// GET /lobbies/:code/content
///
/// The caller's view of the game running in the lobby.
#[instrument(name = "lobby_content", skip(state))]
pub async fn lobby_content(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(state.lobby_service.content(&code, player_id).await?))
}

/// GET /games
pub async fn list_games(State(state): State<AppState>) -> Json<Vec<GameInfo>> {
    Json(state.games.all_info())
}
