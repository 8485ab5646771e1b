use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::types::{CreateLobbyRequest, JoinLobbyRequest, LobbyResponse};
use crate::event::{Event, EventBus, EventPayload};
use crate::games::GameRegistry;
use crate::shared::AppError;
use crate::store::{JoinLobbyResult, Lobby, NewLobby, Store};
use crate::websockets::PlayerSummary;

const CODE_ATTEMPTS: usize = 5;

/// Service for handling lobby business logic
pub struct LobbyService {
    store: Arc<dyn Store>,
    event_bus: EventBus,
    games: Arc<GameRegistry>,
    default_game_type: String,
}

impl LobbyService {
    pub fn new(
        store: Arc<dyn Store>,
        event_bus: EventBus,
        games: Arc<GameRegistry>,
        default_game_type: String,
    ) -> Self {
        Self {
            store,
            event_bus,
            games,
            default_game_type,
        }
    }

    /// Creates a lobby with a fresh code and makes the caller its host
    #[instrument(skip(self, request))]
    pub async fn create_lobby(
        &self,
        player_id: Uuid,
        request: CreateLobbyRequest,
    ) -> Result<LobbyResponse, AppError> {
        let name = request.name.trim();
        let nickname = request.nickname.trim();
        if name.is_empty() || nickname.is_empty() {
            return Err(AppError::BadRequest(
                "Lobby name and nickname are required".to_string(),
            ));
        }

        let game_type = request
            .game_type
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .unwrap_or(self.default_game_type.as_str())
            .to_string();
        if self.games.get(&game_type).is_none() {
            return Err(AppError::BadRequest(format!(
                "Game type {} is not available",
                game_type
            )));
        }

        let lobby = self.insert_with_fresh_code(name, &game_type).await?;
        self.store
            .add_participant(lobby.id, player_id, nickname, true)
            .await?;

        info!(lobby_code = %lobby.code, game_type = %game_type, "Lobby created");
        self.event_bus
            .publish(Event::new(
                lobby.code.clone(),
                EventPayload::PlayerJoined {
                    player_id,
                    nickname: nickname.to_string(),
                },
            ))
            .await;

        self.lobby_response(lobby).await
    }

    async fn insert_with_fresh_code(&self, name: &str, game_type: &str) -> Result<Lobby, AppError> {
        for attempt in 1..=CODE_ATTEMPTS {
            let new_lobby = NewLobby {
                code: generate_code(),
                name: name.to_string(),
                game_type: game_type.to_string(),
            };
            match self.store.create_lobby(&new_lobby).await {
                Ok(lobby) => return Ok(lobby),
                Err(AppError::Conflict(_)) => {
                    debug!(code = %new_lobby.code, attempt, "Lobby code taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        warn!(attempts = CODE_ATTEMPTS, "Could not find a free lobby code");
        Err(AppError::Internal)
    }

    /// Adds the caller to a lobby. Joining twice is a no-op.
    #[instrument(skip(self, request))]
    pub async fn join_lobby(
        &self,
        code: &str,
        player_id: Uuid,
        request: JoinLobbyRequest,
    ) -> Result<LobbyResponse, AppError> {
        let nickname = request.nickname.trim();
        if nickname.is_empty() {
            return Err(AppError::BadRequest("Nickname is required".to_string()));
        }

        let lobby = self.find_lobby(code).await?;
        match self
            .store
            .add_participant(lobby.id, player_id, nickname, false)
            .await?
        {
            JoinLobbyResult::Joined(participation) => {
                info!(lobby_code = %code, player_id = %player_id, "Player joined lobby");
                self.event_bus
                    .publish(Event::new(
                        lobby.code.clone(),
                        EventPayload::PlayerJoined {
                            player_id,
                            nickname: participation.nickname,
                        },
                    ))
                    .await;
            }
            JoinLobbyResult::AlreadyJoined(_) => {
                debug!(lobby_code = %code, player_id = %player_id, "Player already in lobby");
            }
        }

        self.lobby_response(lobby).await
    }

    /// Removes a non-host player. The host stays for the life of the lobby.
    #[instrument(skip(self))]
    pub async fn leave_lobby(&self, code: &str, player_id: Uuid) -> Result<LobbyResponse, AppError> {
        let lobby = self.find_lobby(code).await?;
        let participation = self
            .store
            .get_participation(lobby.id, player_id)
            .await?
            .ok_or_else(|| AppError::NotFound("You are not in this lobby".to_string()))?;

        if participation.is_host {
            return Err(AppError::BadRequest("The host cannot leave the lobby".to_string()));
        }

        if self.store.remove_participant(lobby.id, player_id).await? {
            info!(lobby_code = %code, player_id = %player_id, "Player left lobby");
            self.event_bus
                .publish(Event::new(
                    lobby.code.clone(),
                    EventPayload::PlayerLeft {
                        player_id,
                        nickname: participation.nickname,
                    },
                ))
                .await;

            if let Some(game) = self.games.get(&lobby.game_type) {
                game.player_left(&lobby).await?;
            }
        }

        self.lobby_response(lobby).await
    }

    #[instrument(skip(self))]
    pub async fn get_lobby(&self, code: &str) -> Result<LobbyResponse, AppError> {
        let lobby = self.find_lobby(code).await?;
        self.lobby_response(lobby).await
    }

    #[instrument(skip(self))]
    pub async fn list_lobbies(&self) -> Result<Vec<LobbyResponse>, AppError> {
        let lobbies = self.store.list_lobbies().await?;
        let mut responses = Vec::with_capacity(lobbies.len());
        for lobby in lobbies {
            responses.push(self.lobby_response(lobby).await?);
        }
        Ok(responses)
    }

    /// Hands the per-player snapshot off to the lobby's game variant
    #[instrument(skip(self))]
    pub async fn content(&self, code: &str, player_id: Uuid) -> Result<serde_json::Value, AppError> {
        let lobby = self.find_lobby(code).await?;
        let game = self.games.get(&lobby.game_type).ok_or_else(|| {
            warn!(lobby_code = %code, game_type = %lobby.game_type, "Lobby has unknown game type");
            AppError::Internal
        })?;
        game.content_view(&lobby, player_id).await
    }

    pub async fn find_lobby(&self, code: &str) -> Result<Lobby, AppError> {
        self.store
            .get_lobby_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lobby {} not found", code)))
    }

    /// Participants in join order, as sent to clients
    pub async fn player_summaries(&self, lobby: &Lobby) -> Result<Vec<PlayerSummary>, AppError> {
        player_summaries(self.store.as_ref(), lobby).await
    }

    async fn lobby_response(&self, lobby: Lobby) -> Result<LobbyResponse, AppError> {
        let players = self.player_summaries(&lobby).await?;
        Ok(LobbyResponse {
            code: lobby.code,
            name: lobby.name,
            game_type: lobby.game_type,
            phase: lobby.phase,
            players,
            created_at: lobby.created_at,
        })
    }
}

pub async fn player_summaries(store: &dyn Store, lobby: &Lobby) -> Result<Vec<PlayerSummary>, AppError> {
    Ok(store
        .list_participants(lobby.id)
        .await?
        .into_iter()
        .map(|p| PlayerSummary {
            player_id: p.player_id,
            nickname: p.nickname,
            is_host: p.is_host,
        })
        .collect())
}

/// Six uppercase hex characters
fn generate_code() -> String {
    let bytes: [u8; 3] = rand::random();
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;

    fn create_request(name: &str, nickname: &str) -> CreateLobbyRequest {
        CreateLobbyRequest {
            name: name.to_string(),
            nickname: nickname.to_string(),
            game_type: None,
        }
    }

    #[test]
    fn test_generated_codes_are_six_uppercase_hex() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[tokio::test]
    async fn test_create_lobby_makes_creator_host() {
        let state = AppStateBuilder::new().build().await;
        let host = Uuid::new_v4();

        let lobby = state
            .lobby_service
            .create_lobby(host, create_request("  Friday quiz ", " Ada "))
            .await
            .unwrap();

        assert_eq!(lobby.name, "Friday quiz");
        assert_eq!(lobby.game_type, "trivia");
        assert_eq!(lobby.players.len(), 1);
        assert_eq!(lobby.players[0].player_id, host);
        assert_eq!(lobby.players[0].nickname, "Ada");
        assert!(lobby.players[0].is_host);
    }

    #[tokio::test]
    async fn test_create_lobby_rejects_blank_fields_and_unknown_games() {
        let state = AppStateBuilder::new().build().await;
        let host = Uuid::new_v4();

        let blank = state
            .lobby_service
            .create_lobby(host, create_request("   ", "Ada"))
            .await;
        assert!(matches!(blank, Err(AppError::BadRequest(_))));

        let mut placeholder = create_request("Quiz", "Ada");
        placeholder.game_type = Some("quickdraw".to_string());
        let unknown = state.lobby_service.create_lobby(host, placeholder).await;
        assert!(matches!(unknown, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_host_cannot_leave() {
        let state = AppStateBuilder::new().build().await;
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let lobby = state
            .lobby_service
            .create_lobby(host, create_request("Quiz", "Ada"))
            .await
            .unwrap();

        let join = || JoinLobbyRequest {
            nickname: "Grace".to_string(),
        };
        state
            .lobby_service
            .join_lobby(&lobby.code, guest, join())
            .await
            .unwrap();
        let again = state
            .lobby_service
            .join_lobby(&lobby.code, guest, join())
            .await
            .unwrap();
        assert_eq!(again.players.len(), 2);

        let host_leave = state.lobby_service.leave_lobby(&lobby.code, host).await;
        assert!(matches!(host_leave, Err(AppError::BadRequest(_))));

        let after = state
            .lobby_service
            .leave_lobby(&lobby.code, guest)
            .await
            .unwrap();
        assert_eq!(after.players.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_lobby_is_not_found() {
        let state = AppStateBuilder::new().build().await;
        let result = state.lobby_service.get_lobby("NOPE00").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
