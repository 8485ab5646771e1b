// Library crate for the trivia party server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod event;
pub mod games;
pub mod identity;
pub mod lobby;
pub mod shared;
pub mod store;
pub mod trivia;
pub mod websockets;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

// Re-export commonly used types for easier access in tests
pub use config::AppConfig;
pub use event::{Event, EventBus, EventError, EventHandler, EventPayload};
pub use games::{Game, GameInfo, GameRegistry};
pub use shared::{AppError, AppState};
pub use store::{InMemoryStore, PostgresStore, Store};
pub use websockets::{Hub, LiveConnection, MessageSink, MessageType, WebSocketMessage};

/// All HTTP and WebSocket routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "triviahub" }))
        .route("/games", get(lobby::list_games))
        .route("/lobbies", post(lobby::create_lobby).get(lobby::list_lobbies))
        .route("/lobbies/:code", get(lobby::get_lobby))
        .route("/lobbies/:code/join", post(lobby::join_lobby))
        .route("/lobbies/:code/leave", post(lobby::leave_lobby))
        .route("/lobbies/:code/content", get(lobby::lobby_content))
        .route("/lobbies/:code/ws", get(websockets::websocket_handler))
        .route("/lobbies/:code/trivia/start", post(trivia::start_game))
        .route("/lobbies/:code/trivia/questions", post(trivia::submit_question))
        .route("/lobbies/:code/trivia/advance", post(trivia::advance_round))
        .route("/lobbies/:code/trivia/next-question", post(trivia::next_question))
        .route("/lobbies/:code/trivia/play-again", post(trivia::play_again))
        .route("/lobbies/:code/trivia/answers", post(trivia::submit_answer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
