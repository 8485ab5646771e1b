use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::events::Event;
use super::handler::{EventError, EventHandler};

/// In-process publish/subscribe bus.
///
/// `publish` runs every registered handler in registration order on the
/// caller's task. There is no queue and no retry: delivery is best effort and
/// an event published while nobody is listening is simply dropped.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for the lifetime of the process
    pub async fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        info!(handler = handler.name(), "Registering event handler");
        self.handlers.write().await.push(handler);
    }

    /// Delivers the event to every handler. Never fails from the caller's
    /// point of view: handler errors are logged and skipped.
    pub async fn publish(&self, event: Event) {
        // Snapshot so a handler may subscribe without deadlocking the bus
        let handlers = self.handlers.read().await.clone();

        debug!(
            event_type = event.event_type(),
            lobby_code = %event.lobby_code,
            handler_count = handlers.len(),
            "Publishing event"
        );

        for handler in handlers {
            if let Err(e) = handler.handle(&event).await {
                warn!(
                    handler = handler.name(),
                    event_type = event.event_type(),
                    lobby_code = %event.lobby_code,
                    error = %e,
                    "Event handler failed"
                );
            }
        }
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Appends its name to a shared log so tests can check call order
    struct RecordingHandler {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &Event) -> Result<(), EventError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.event_type()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::HandlerError("render failed".to_string()))
        }

        fn name(&self) -> &'static str {
            "FailingHandler"
        }
    }

    fn game_started() -> Event {
        Event::new("ABC123", EventPayload::GameStarted { round_number: 1 })
    }

    #[tokio::test]
    async fn test_publish_runs_handlers_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            bus.subscribe(Arc::new(RecordingHandler {
                name,
                log: log.clone(),
            }))
            .await;
        }

        bus.publish(game_started()).await;

        // Synchronous dispatch: everything has run by the time publish returns
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:game.started",
                "second:game.started",
                "third:game.started"
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(FailingHandler)).await;
        bus.subscribe(Arc::new(RecordingHandler {
            name: "after",
            log: log.clone(),
        }))
        .await;

        bus.publish(game_started()).await;

        assert_eq!(*log.lock().unwrap(), vec!["after:game.started"]);
    }

    #[tokio::test]
    async fn test_publish_without_handlers_is_a_no_op() {
        let bus = EventBus::new();
        bus.publish(game_started()).await;
        assert_eq!(bus.handler_count().await, 0);
    }
}
