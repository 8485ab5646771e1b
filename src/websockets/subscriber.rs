use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::hub::Hub;
use super::messages::WebSocketMessage;
use crate::event::{Event, EventError, EventHandler, EventPayload};
use crate::games::GameRegistry;
use crate::lobby::player_summaries;
use crate::store::{Lobby, Store};

/// Bus handler that turns lobby events into live updates.
///
/// Membership changes are handled here for every game variant; everything
/// else goes to the variant the lobby is playing.
pub struct LobbySubscriber {
    store: Arc<dyn Store>,
    hub: Arc<Hub>,
    games: Arc<GameRegistry>,
}

impl LobbySubscriber {
    pub fn new(store: Arc<dyn Store>, hub: Arc<Hub>, games: Arc<GameRegistry>) -> Self {
        Self { store, hub, games }
    }

    async fn broadcast_players(&self, lobby: &Lobby) -> Result<(), EventError> {
        let players = player_summaries(self.store.as_ref(), lobby).await?;
        let message = WebSocketMessage::players_list(players)?.to_json()?;
        let delivered = self.hub.broadcast(&lobby.code, &message).await;
        debug!(lobby_code = %lobby.code, delivered, "Broadcast player list");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for LobbySubscriber {
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        info!(
            lobby_code = %event.lobby_code,
            event_type = event.event_type(),
            "Handling lobby event for WebSocket connections"
        );

        // Nobody to tell
        if self.hub.connection_count(&event.lobby_code).await == 0 {
            return Ok(());
        }

        let lobby = self
            .store
            .get_lobby_by_code(&event.lobby_code)
            .await?
            .ok_or_else(|| EventError::NotFound(format!("Lobby {}", event.lobby_code)))?;

        match &event.payload {
            EventPayload::PlayerJoined { .. } | EventPayload::PlayerLeft { .. } => {
                self.broadcast_players(&lobby).await
            }
            _ => {
                let game = self.games.get(&lobby.game_type).ok_or_else(|| {
                    EventError::HandlerError(format!("No game registered for {}", lobby.game_type))
                })?;
                if !game.handle_event(event, &self.hub).await {
                    debug!(
                        lobby_code = %lobby.code,
                        game_type = %lobby.game_type,
                        event_type = event.event_type(),
                        "Event not handled by game"
                    );
                }
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "LobbySubscriber"
    }
}
