use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hub::{ChannelSink, Hub, LiveConnection};
use super::messages::WebSocketMessage;
use super::socket::{ConnectionTask, DisconnectReason, SocketWrapper};
use crate::identity::PlayerIdentity;
use crate::shared::{AppError, AppState};

/// WebSocket endpoint for live lobby updates
/// GET /lobbies/:code/ws with the caller's id in `x-player-id`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    info!(lobby_code = %code, player_id = %player_id, "WebSocket connection requested");

    // Verify lobby exists before upgrading
    let lobby = app_state.lobby_service.find_lobby(&code).await?;

    let players = app_state.lobby_service.player_summaries(&lobby).await?;
    let initial_message = WebSocketMessage::players_list(players)?.to_json()?;

    let hub = Arc::clone(&app_state.hub);
    let shutdown = app_state.shutdown.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let reason = serve_connection(
            hub,
            lobby.code,
            player_id,
            Box::new(socket),
            vec![initial_message],
            shutdown,
        )
        .await;
        debug!(player_id = %player_id, reason = ?reason, "WebSocket handler finished");
    }))
}

/// Runs one live connection from registration to cleanup.
///
/// `initial_messages` are queued before the connection becomes visible to
/// broadcasts, so the client always sees them first. Whatever ends the
/// connection, it is unregistered and the remaining viewers get a fresh
/// presence count.
pub async fn serve_connection(
    hub: Arc<Hub>,
    lobby_code: String,
    player_id: Uuid,
    socket: Box<dyn SocketWrapper>,
    initial_messages: Vec<String>,
    shutdown: watch::Receiver<bool>,
) -> DisconnectReason {
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
    for message in initial_messages {
        // Receiver is alive until the task below drops it
        let _ = outbound_sender.send(message);
    }

    let connection = LiveConnection::new(Arc::new(ChannelSink::new(outbound_sender)));
    hub.register(&lobby_code, &connection, player_id).await;
    let guard = RegistrationGuard::new(Arc::clone(&hub), lobby_code.clone(), connection.id());

    info!(
        lobby_code = %lobby_code,
        player_id = %player_id,
        connection_id = %connection.id(),
        "WebSocket connection established"
    );
    broadcast_presence(&hub, &lobby_code).await;

    let reason = ConnectionTask::new(
        lobby_code.clone(),
        player_id,
        socket,
        outbound_receiver,
        shutdown,
    )
    .run()
    .await;

    guard.disarm();
    hub.unregister(&lobby_code, connection.id()).await;

    match &reason {
        DisconnectReason::ReceiveFailed(e) => warn!(
            lobby_code = %lobby_code,
            player_id = %player_id,
            error = %e,
            "WebSocket connection error"
        ),
        _ => info!(
            lobby_code = %lobby_code,
            player_id = %player_id,
            reason = ?reason,
            "WebSocket connection closed"
        ),
    }

    broadcast_presence(&hub, &lobby_code).await;
    reason
}

async fn broadcast_presence(hub: &Hub, lobby_code: &str) {
    let connected = hub.connection_count(lobby_code).await;
    match WebSocketMessage::presence(connected).and_then(|m| m.to_json()) {
        Ok(message) => {
            hub.broadcast(lobby_code, &message).await;
        }
        Err(e) => warn!(lobby_code = %lobby_code, error = %e, "Failed to render presence"),
    }
}

/// Unregisters the connection if the serving future is dropped before it
/// could clean up after itself.
struct RegistrationGuard {
    hub: Arc<Hub>,
    lobby_code: String,
    connection_id: Uuid,
    armed: bool,
}

impl RegistrationGuard {
    fn new(hub: Arc<Hub>, lobby_code: String, connection_id: Uuid) -> Self {
        Self {
            hub,
            lobby_code,
            connection_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(lobby_code = %self.lobby_code, "No runtime to unregister dropped connection");
            return;
        };
        let hub = Arc::clone(&self.hub);
        let lobby_code = std::mem::take(&mut self.lobby_code);
        let connection_id = self.connection_id;
        runtime.spawn(async move {
            hub.unregister(&lobby_code, connection_id).await;
            broadcast_presence(&hub, &lobby_code).await;
        });
    }
}
