// Game variants and the registry that dispatches lobby events to them

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::event::Event;
use crate::shared::AppError;
use crate::store::Lobby;
use crate::websockets::Hub;

/// Catalogue entry for a game variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameInfo {
    pub slug: String,
    pub name: String,
    pub description: String,
    /// Placeholders are listed but cannot be picked for a lobby
    pub ready: bool,
}

impl GameInfo {
    pub fn placeholder(slug: &str, name: &str, description: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            ready: false,
        }
    }
}

/// What a game variant must provide to plug into a lobby
#[async_trait]
pub trait Game: Send + Sync {
    fn info(&self) -> GameInfo;

    /// React to a lobby event by notifying live viewers.
    /// Returns false when the variant does not care about this event.
    async fn handle_event(&self, event: &Event, hub: &Hub) -> bool;

    /// Point-in-time snapshot of the game for one player
    async fn content_view(&self, lobby: &Lobby, player_id: Uuid)
        -> Result<serde_json::Value, AppError>;

    /// Called after a player has left the lobby
    async fn player_left(&self, _lobby: &Lobby) -> Result<(), AppError> {
        Ok(())
    }
}

/// Game variants keyed by slug
#[derive(Default)]
pub struct GameRegistry {
    games: HashMap<String, Arc<dyn Game>>,
    placeholders: Vec<GameInfo>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, game: Arc<dyn Game>) {
        self.games.insert(game.info().slug, game);
    }

    pub fn register_placeholder(&mut self, info: GameInfo) {
        self.placeholders.push(info);
    }

    pub fn get(&self, slug: &str) -> Option<Arc<dyn Game>> {
        self.games.get(slug).cloned()
    }

    /// Playable variants first (by name), then placeholders in registration order
    pub fn all_info(&self) -> Vec<GameInfo> {
        let mut ready: Vec<GameInfo> = self.games.values().map(|game| game.info()).collect();
        ready.sort_by(|a, b| a.name.cmp(&b.name));
        ready.extend(self.placeholders.iter().cloned());
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubGame;

    #[async_trait]
    impl Game for StubGame {
        fn info(&self) -> GameInfo {
            GameInfo {
                slug: "stub".to_string(),
                name: "Stub".to_string(),
                description: "Does nothing".to_string(),
                ready: true,
            }
        }

        async fn handle_event(&self, _event: &Event, _hub: &Hub) -> bool {
            false
        }

        async fn content_view(
            &self,
            _lobby: &Lobby,
            _player_id: Uuid,
        ) -> Result<serde_json::Value, AppError> {
            Ok(serde_json::Value::Null)
        }
    }

    #[test]
    fn test_registry_lookup_and_listing() {
        let mut registry = GameRegistry::new();
        registry.register(Arc::new(StubGame));
        registry.register_placeholder(GameInfo::placeholder("later", "Later", "Soon"));

        assert!(registry.get("stub").is_some());
        assert!(registry.get("later").is_none());

        let info = registry.all_info();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].slug, "stub");
        assert!(info[0].ready);
        assert_eq!(info[1].slug, "later");
        assert!(!info[1].ready);
    }
}
