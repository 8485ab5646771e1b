use async_trait::async_trait;
use thiserror::Error;

use super::events::Event;
use crate::shared::AppError;

/// Errors that can occur when handling events
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Handler error: {0}")]
    HandlerError(String),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AppError> for EventError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => EventError::NotFound(msg),
            other => EventError::HandlerError(other.to_string()),
        }
    }
}

/// Trait for components that react to published events
///
/// Handlers run on the publisher's task, one after another, so a slow
/// handler delays the action that published the event. A returned error is
/// logged by the bus and never reaches the publisher.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), EventError>;

    /// Get a human-readable name for this handler (for logging/debugging)
    fn name(&self) -> &'static str;
}
