// Public API - what other modules can use
pub use handlers::{
    create_lobby, get_lobby, join_lobby, leave_lobby, list_games, list_lobbies, lobby_content,
};
pub use service::{player_summaries, LobbyService};
pub use types::{CreateLobbyRequest, JoinLobbyRequest, LobbyResponse};

// Internal modules
mod handlers;
mod service;
mod types;
