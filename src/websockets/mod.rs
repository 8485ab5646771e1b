// Public API
pub use handler::{serve_connection, websocket_handler};
pub use hub::{ChannelSink, Hub, LiveConnection, MessageSink, SendError};
pub use messages::{MessageType, PlayerSummary, WebSocketMessage};
pub use socket::{ConnectionTask, DisconnectReason, Incoming, SocketError, SocketWrapper};
pub use subscriber::LobbySubscriber;

// Internal modules
mod handler;
mod hub;
mod messages;
mod socket;
mod subscriber;
