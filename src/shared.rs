use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::event::EventBus;
use crate::games::GameRegistry;
use crate::lobby::LobbyService;
use crate::store::Store;
use crate::trivia::TriviaService;
use crate::websockets::Hub;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub event_bus: EventBus,
    pub hub: Arc<Hub>,
    pub games: Arc<GameRegistry>,
    pub lobby_service: Arc<LobbyService>,
    pub trivia_service: Arc<TriviaService>,
    /// Flips to `true` when the process is shutting down
    pub shutdown: watch::Receiver<bool>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!(error = %err, "Failed to serialize view");
        AppError::Internal
    }
}


impl AppState {
    /// Builds the full dependency graph and subscribes the lobby subscriber to the bus.
    pub async fn assemble(
        config: AppConfig,
        store: Arc<dyn Store>,
        hub: Arc<Hub>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let config = Arc::new(config);
        let event_bus = EventBus::new();

        let trivia_service = Arc::new(TriviaService::new(
            Arc::clone(&store),
            event_bus.clone(),
            config.shuffle_question_order,
        ));

        let mut games = GameRegistry::new();
        games.register(Arc::new(crate::trivia::TriviaGame::new(
            Arc::clone(&trivia_service),
            Arc::clone(&store),
        )));
        games.register_placeholder(crate::games::GameInfo::placeholder(
            "quickdraw",
            "Quick Draw",
            "Sketch a prompt while everyone else guesses.",
        ));
        let games = Arc::new(games);

        let lobby_service = Arc::new(LobbyService::new(
            Arc::clone(&store),
            event_bus.clone(),
            Arc::clone(&games),
            config.default_game_type.clone(),
        ));

        event_bus
            .subscribe(Arc::new(crate::websockets::LobbySubscriber::new(
                Arc::clone(&store),
                Arc::clone(&hub),
                Arc::clone(&games),
            )))
            .await;

        Self {
            config,
            store,
            event_bus,
            hub,
            games,
            lobby_service,
            trivia_service,
            shutdown,
        }
    }
}
