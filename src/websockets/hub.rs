use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A failed write to one connection
#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Failed(String),
}

/// Where the hub writes messages for one live connection
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), SendError>;
}

/// Sink that feeds the outbound queue drained by the connection's own task
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&self, message: &str) -> Result<(), SendError> {
        self.sender
            .send(message.to_string())
            .map_err(|_| SendError::Closed)
    }
}

/// Handle for one live connection as the hub sees it
#[derive(Clone)]
pub struct LiveConnection {
    id: Uuid,
    sink: Arc<dyn MessageSink>,
}

impl LiveConnection {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sink,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

struct Member {
    player_id: Uuid,
    sink: Arc<dyn MessageSink>,
}

/// Live connections grouped by lobby code ("rooms").
///
/// The room map sits behind a single RwLock that is only held long enough
/// to mutate it or to snapshot a room; every write to a connection happens
/// after the lock is released.
#[derive(Default)]
pub struct Hub {
    rooms: RwLock<HashMap<String, HashMap<Uuid, Member>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to a room, creating the room if needed
    pub async fn register(&self, lobby_code: &str, connection: &LiveConnection, player_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(lobby_code.to_string()).or_default();
        room.insert(
            connection.id,
            Member {
                player_id,
                sink: Arc::clone(&connection.sink),
            },
        );

        info!(
            lobby_code = %lobby_code,
            player_id = %player_id,
            connection_id = %connection.id,
            total = room.len(),
            "Client connected to lobby"
        );
    }

    /// Removes a connection; an emptied room is dropped from the map.
    /// Returns false if the connection was not registered.
    pub async fn unregister(&self, lobby_code: &str, connection_id: Uuid) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(lobby_code) else {
            return false;
        };

        let removed = room.remove(&connection_id).is_some();
        let remaining = room.len();
        if remaining == 0 {
            rooms.remove(lobby_code);
        }

        if removed {
            info!(
                lobby_code = %lobby_code,
                connection_id = %connection_id,
                remaining,
                "Client disconnected from lobby"
            );
        }
        removed
    }

    /// Sends the same message to every connection in the room.
    /// Returns how many writes succeeded.
    pub async fn broadcast(&self, lobby_code: &str, message: &str) -> usize {
        let members = self.snapshot(lobby_code).await;
        if members.is_empty() {
            return 0;
        }

        debug!(lobby_code = %lobby_code, clients = members.len(), "Broadcasting to lobby");

        let mut delivered = 0;
        for (connection_id, player_id, sink) in members {
            match sink.send(message).await {
                Ok(()) => delivered += 1,
                // The connection's read loop is responsible for cleaning it up
                Err(e) => warn!(
                    lobby_code = %lobby_code,
                    connection_id = %connection_id,
                    player_id = %player_id,
                    error = %e,
                    "Error writing to client"
                ),
            }
        }
        delivered
    }

    /// Renders a message per viewer and sends it to that viewer's connection.
    /// `render` returning `None` skips the viewer.
    pub async fn broadcast_personalized<F>(&self, lobby_code: &str, render: F) -> usize
    where
        F: Fn(Uuid) -> Option<String> + Send + Sync,
    {
        let members = self.snapshot(lobby_code).await;
        if members.is_empty() {
            return 0;
        }

        debug!(
            lobby_code = %lobby_code,
            clients = members.len(),
            "Broadcasting personalized messages to lobby"
        );

        let mut delivered = 0;
        for (connection_id, player_id, sink) in members {
            let Some(message) = render(player_id) else {
                continue;
            };
            match sink.send(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    lobby_code = %lobby_code,
                    connection_id = %connection_id,
                    player_id = %player_id,
                    error = %e,
                    "Error writing personalized message to client"
                ),
            }
        }
        delivered
    }

    pub async fn connection_count(&self, lobby_code: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(lobby_code)
            .map_or(0, |room| room.len())
    }

    /// Number of rooms with at least one connection
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn snapshot(&self, lobby_code: &str) -> Vec<(Uuid, Uuid, Arc<dyn MessageSink>)> {
        let rooms = self.rooms.read().await;
        rooms
            .get(lobby_code)
            .map(|room| {
                room.iter()
                    .map(|(id, member)| (*id, member.player_id, Arc::clone(&member.sink)))
                    .collect()
            })
            .unwrap_or_default()
    }
}
