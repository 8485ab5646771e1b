use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use triviahub::websockets::{Incoming, MessageSink, SendError, SocketError, SocketWrapper};
use triviahub::{Event, EventError, EventHandler, EventPayload};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Connection sink that records everything sent to it
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<VecDeque<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the oldest unread message
    pub async fn consume(&self) -> Option<String> {
        self.messages.lock().await.pop_front()
    }

    pub async fn pending(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        self.messages.lock().await.clear();
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, message: &str) -> Result<(), SendError> {
        self.messages.lock().await.push_back(message.to_string());
        Ok(())
    }
}

/// Connection sink whose peer has gone away
pub struct BrokenSink;

#[async_trait]
impl MessageSink for BrokenSink {
    async fn send(&self, _message: &str) -> Result<(), SendError> {
        Err(SendError::Closed)
    }
}

/// Connection sink on a slow link: every write takes `delay`
pub struct SlowSink {
    delay: Duration,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl MessageSink for SlowSink {
    async fn send(&self, _message: &str) -> Result<(), SendError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Bus handler counting how many questions were revealed
#[derive(Default)]
pub struct RevealCounter {
    count: AtomicUsize,
}

impl RevealCounter {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for RevealCounter {
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        if matches!(event.payload, EventPayload::QuestionRevealed { .. }) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RevealCounter"
    }
}

/// What the test can observe about a mock socket after the fact
#[derive(Clone, Default)]
pub struct SocketProbe {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl SocketProbe {
    pub async fn sent(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }

    pub async fn was_closed(&self) -> bool {
        *self.closed.lock().await
    }
}

/// Scripted socket: inbound frames come from a channel the test controls.
/// Dropping the controlling sender looks like the peer closing.
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<Result<Incoming, SocketError>>,
    probe: SocketProbe,
}

impl MockSocket {
    pub fn new() -> (
        Self,
        mpsc::UnboundedSender<Result<Incoming, SocketError>>,
        SocketProbe,
    ) {
        let (sender, inbound) = mpsc::unbounded_channel();
        let probe = SocketProbe::default();
        (
            Self {
                inbound,
                probe: probe.clone(),
            },
            sender,
            probe,
        )
    }
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.probe.sent.lock().await.push(message);
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<Incoming, SocketError> {
        match self.inbound.recv().await {
            Some(frame) => frame,
            None => Ok(Incoming::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        *self.probe.closed.lock().await = true;
        Ok(())
    }
}
