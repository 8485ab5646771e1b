use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use futures::SinkExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

/// What arrived on the socket
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Text(String),
    /// Binary, ping or pong frames
    Control,
    Closed,
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    async fn receive_message(&mut self) -> Result<Incoming, SocketError>;

    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Incoming, SocketError> {
        match self.next().await {
            Some(Ok(Message::Text(text))) => Ok(Incoming::Text(text)),
            Some(Ok(Message::Close(_))) | None => Ok(Incoming::Closed),
            Some(Ok(_)) => Ok(Incoming::Control),
            Some(Err(e)) => Err(SocketError::ReceiveFailed(e.to_string())),
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        SinkExt::close(self)
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Why a connection task stopped
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    PeerClosed,
    ReceiveFailed(String),
    Shutdown,
    /// Every sender for the outbound queue went away
    OutboundClosed,
}

/// Drives one upgraded socket until it goes away.
///
/// Outbound messages queued by the hub are written to the socket; inbound
/// frames are read only to notice disconnection. A failed socket write is
/// logged and the loop keeps reading, so the read side alone decides when
/// the connection is gone.
pub struct ConnectionTask {
    lobby_code: String,
    player_id: Uuid,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionTask {
    pub fn new(
        lobby_code: String,
        player_id: Uuid,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            lobby_code,
            player_id,
            socket,
            outbound_receiver,
            shutdown,
        }
    }

    /// Runs until the peer closes, a receive fails or shutdown is signalled,
    /// then closes the socket.
    pub async fn run(mut self) -> DisconnectReason {
        let reason = if *self.shutdown.borrow() {
            DisconnectReason::Shutdown
        } else {
            self.pump().await
        };

        if let Err(e) = self.socket.close().await {
            debug!(lobby_code = %self.lobby_code, error = %e, "Socket already closed");
        }
        reason
    }

    async fn pump(&mut self) -> DisconnectReason {
        // A dropped sender means no shutdown signal can arrive any more
        let mut shutdown_open = true;
        loop {
            tokio::select! {
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => {
                            if let Err(e) = self.socket.send_message(message).await {
                                warn!(
                                    lobby_code = %self.lobby_code,
                                    player_id = %self.player_id,
                                    error = %e,
                                    "Failed to write to socket"
                                );
                            }
                        }
                        None => return DisconnectReason::OutboundClosed,
                    }
                }

                incoming = self.socket.receive_message() => {
                    match incoming {
                        Ok(Incoming::Text(text)) => {
                            debug!(
                                lobby_code = %self.lobby_code,
                                player_id = %self.player_id,
                                message = %text,
                                "Ignoring inbound message"
                            );
                        }
                        Ok(Incoming::Control) => {}
                        Ok(Incoming::Closed) => return DisconnectReason::PeerClosed,
                        Err(e) => return DisconnectReason::ReceiveFailed(e.to_string()),
                    }
                }

                changed = self.shutdown.changed(), if shutdown_open => {
                    match changed {
                        Ok(()) if *self.shutdown.borrow() => return DisconnectReason::Shutdown,
                        Ok(()) => {}
                        Err(_) => shutdown_open = false,
                    }
                }
            }
        }
    }
}
