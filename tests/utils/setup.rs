#![allow(dead_code)] // Not every test file uses every helper

use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use triviahub::{
    lobby::{CreateLobbyRequest, JoinLobbyRequest},
    store::{InMemoryStore, Round, Store},
    trivia::{AnswerResponse, RoundResponse, SubmitAnswerRequest, SubmitQuestionRequest},
    AppConfig, AppError, AppState, Hub, LiveConnection,
};

use super::mocks::RecordingSink;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestPlayer {
    pub name: String,
    pub id: Uuid,
    /// Present when the player has a live connection
    pub sink: Option<Arc<RecordingSink>>,
}

pub struct TestSetup {
    pub state: AppState,
    pub lobby_code: String,
    /// First player is the host
    pub players: Vec<TestPlayer>,
    pub shutdown: watch::Sender<bool>,
}

pub struct TestSetupBuilder {
    players: Vec<String>,
    offline: Vec<String>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            players: vec![],
            offline: vec![],
        }
    }

    pub fn with_players(mut self, players: Vec<&str>) -> Self {
        self.players = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    /// Host plus three guests
    pub fn with_four_players(self) -> Self {
        self.with_players(vec!["host", "alice", "bob", "carol"])
    }

    /// These players join the lobby but never open a connection
    pub fn offline(mut self, players: Vec<&str>) -> Self {
        self.offline = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub async fn build(self) -> TestSetup {
        let config = AppConfig {
            shuffle_question_order: false,
            ..AppConfig::default()
        };
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let (shutdown, shutdown_receiver) = watch::channel(false);
        let state =
            AppState::assemble(config, store, Arc::new(Hub::new()), shutdown_receiver).await;
        self.build_in(state, shutdown).await
    }

    /// A second lobby in the same running app as `other`. Shutdown stays
    /// with `other`; this setup's sender is not wired to anything.
    pub async fn build_alongside(self, other: &TestSetup) -> TestSetup {
        let (shutdown, _) = watch::channel(false);
        self.build_in(other.state.clone(), shutdown).await
    }

    async fn build_in(self, state: AppState, shutdown: watch::Sender<bool>) -> TestSetup {
        let mut names = self.players.into_iter();
        let host_name = names.next().unwrap_or_else(|| "host".to_string());
        let host_id = Uuid::new_v4();
        let lobby = state
            .lobby_service
            .create_lobby(
                host_id,
                CreateLobbyRequest {
                    name: "Test lobby".to_string(),
                    nickname: host_name.clone(),
                    game_type: None,
                },
            )
            .await
            .unwrap();

        let mut players = vec![TestPlayer {
            name: host_name,
            id: host_id,
            sink: None,
        }];
        for name in names {
            let id = Uuid::new_v4();
            state
                .lobby_service
                .join_lobby(
                    &lobby.code,
                    id,
                    JoinLobbyRequest {
                        nickname: name.clone(),
                    },
                )
                .await
                .unwrap();
            players.push(TestPlayer {
                name,
                id,
                sink: None,
            });
        }

        // Connect after joining so setup traffic is not recorded
        for player in &mut players {
            if self.offline.contains(&player.name) {
                continue;
            }
            let sink = Arc::new(RecordingSink::new());
            let connection = LiveConnection::new(sink.clone());
            state.hub.register(&lobby.code, &connection, player.id).await;
            player.sink = Some(sink);
        }

        TestSetup {
            state,
            lobby_code: lobby.code,
            players,
            shutdown,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Actions
// ============================================================================

impl TestSetup {
    pub fn player(&self, name: &str) -> &TestPlayer {
        self.players
            .iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("no player named {}", name))
    }

    pub fn id(&self, name: &str) -> Uuid {
        self.player(name).id
    }

    pub fn host(&self) -> Uuid {
        self.players[0].id
    }

    pub async fn clear_messages(&self) {
        for player in &self.players {
            if let Some(sink) = &player.sink {
                sink.clear().await;
            }
        }
    }

    pub async fn start_game(&self) -> RoundResponse {
        self.state
            .trivia_service
            .start_game(&self.lobby_code, self.host())
            .await
            .unwrap()
    }

    pub async fn submit_question(&self, name: &str) -> Result<Uuid, AppError> {
        let response = self
            .state
            .trivia_service
            .submit_question(
                &self.lobby_code,
                self.id(name),
                SubmitQuestionRequest {
                    question_text: format!("What does {} like?", name),
                    correct_answer: format!("right-{}", name),
                    wrong_answers: [
                        format!("wrong-a-{}", name),
                        format!("wrong-b-{}", name),
                        format!("wrong-c-{}", name),
                    ],
                },
            )
            .await?;
        Ok(response.id)
    }

    pub async fn start_play(&self) -> Result<RoundResponse, AppError> {
        self.state
            .trivia_service
            .start_round_play(&self.lobby_code, self.host())
            .await
    }

    pub async fn next_question(&self) -> Result<RoundResponse, AppError> {
        self.state
            .trivia_service
            .next_question(&self.lobby_code, self.host())
            .await
    }

    pub async fn play_again(&self) -> Result<RoundResponse, AppError> {
        self.state
            .trivia_service
            .play_again(&self.lobby_code, self.host())
            .await
    }

    pub async fn answer(
        &self,
        name: &str,
        question_id: Uuid,
        answer: &str,
    ) -> Result<AnswerResponse, AppError> {
        self.state
            .trivia_service
            .submit_answer(
                &self.lobby_code,
                self.id(name),
                SubmitAnswerRequest {
                    question_id,
                    answer: answer.to_string(),
                },
            )
            .await
    }

    /// Starts the game, has `authors` each submit one question, starts play.
    /// Returns question ids in display order.
    pub async fn play_with_questions(&self, authors: &[&str]) -> Vec<Uuid> {
        self.start_game().await;
        let mut ids = vec![];
        for author in authors {
            ids.push(self.submit_question(author).await.unwrap());
        }
        self.start_play().await.unwrap();
        ids
    }

    pub async fn active_round(&self) -> Option<Round> {
        let lobby = self
            .state
            .store
            .get_lobby_by_code(&self.lobby_code)
            .await
            .unwrap()
            .unwrap();
        self.state.store.get_active_round(lobby.id).await.unwrap()
    }

    pub async fn leave(&self, name: &str) -> Result<(), AppError> {
        self.state
            .lobby_service
            .leave_lobby(&self.lobby_code, self.id(name))
            .await
            .map(|_| ())
    }

    pub async fn content_for(&self, name: &str) -> serde_json::Value {
        self.state
            .lobby_service
            .content(&self.lobby_code, self.id(name))
            .await
            .unwrap()
    }
}
