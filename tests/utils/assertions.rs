//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use triviahub::websockets::{MessageType, WebSocketMessage};

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct MessageAssertion<'a> {
    setup: &'a TestSetup,
    players: Vec<&'a str>,
}

impl<'a> MessageAssertion<'a> {
    /// Create an assertion for every connected player in the setup
    pub fn for_all_players(setup: &'a TestSetup) -> Self {
        let players = setup
            .players
            .iter()
            .filter(|p| p.sink.is_some())
            .map(|p| p.name.as_str())
            .collect();
        Self { setup, players }
    }

    /// Create an assertion for specific players
    pub fn for_players(setup: &'a TestSetup, players: Vec<&'a str>) -> Self {
        Self { setup, players }
    }

    /// Assert that players received a specific message type (consumes the message from queue)
    pub async fn received_message_type(self, expected_type: MessageType) -> Vec<WebSocketMessage> {
        let mut messages = vec![];

        for player in &self.players {
            let sink = self
                .setup
                .player(player)
                .sink
                .as_ref()
                .unwrap_or_else(|| panic!("{} has no connection", player));
            let message = sink.consume().await;
            assert!(
                message.is_some(),
                "{} should have received a message",
                player
            );

            let msg: WebSocketMessage = serde_json::from_str(&message.unwrap()).unwrap();
            assert_eq!(
                msg.message_type, expected_type,
                "{} received wrong message type",
                player
            );
            messages.push(msg);
        }

        messages
    }

    /// Assert that players have nothing waiting
    pub async fn received_no_messages(self) {
        for player in &self.players {
            if let Some(sink) = &self.setup.player(player).sink {
                let pending = sink.pending().await;
                assert!(
                    pending.is_empty(),
                    "{} should not have received messages, got {:?}",
                    player,
                    pending
                );
            }
        }
    }
}
