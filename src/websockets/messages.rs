use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server -> client message types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    PlayersList,
    Presence,
    SubmitStatus,
    AnswerStatus,
    LiveResults,
    RefreshContent,
    Error,
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub meta: WebSocketMessageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSummary {
    pub player_id: Uuid,
    pub nickname: String,
    pub is_host: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayersListPayload {
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePayload {
    /// Live connections currently open for the lobby
    pub connected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshContentPayload {
    pub reason: String,
    pub round_number: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl WebSocketMessage {
    pub fn new<T: Serialize>(
        message_type: MessageType,
        payload: T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_type,
            payload: serde_json::to_value(payload)?,
            meta: WebSocketMessageMeta {
                timestamp: Utc::now(),
            },
        })
    }

    /// Create a PLAYERS_LIST message
    pub fn players_list(players: Vec<PlayerSummary>) -> Result<Self, serde_json::Error> {
        Self::new(MessageType::PlayersList, PlayersListPayload { players })
    }

    /// Create a PRESENCE message
    pub fn presence(connected: usize) -> Result<Self, serde_json::Error> {
        Self::new(MessageType::Presence, PresencePayload { connected })
    }

    /// Create a REFRESH_CONTENT message
    pub fn refresh_content(
        reason: &str,
        round_number: Option<i32>,
    ) -> Result<Self, serde_json::Error> {
        Self::new(
            MessageType::RefreshContent,
            RefreshContentPayload {
                reason: reason.to_string(),
                round_number,
            },
        )
    }

    /// Create an ERROR message
    pub fn error(message: impl Into<String>) -> Result<Self, serde_json::Error> {
        Self::new(
            MessageType::Error,
            ErrorPayload {
                message: message.into(),
            },
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let player_id = Uuid::new_v4();
        let message = WebSocketMessage::players_list(vec![PlayerSummary {
            player_id,
            nickname: "Alice".to_string(),
            is_host: true,
        }])
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "PLAYERS_LIST");
        assert_eq!(value["payload"]["players"][0]["nickname"], "Alice");
        assert_eq!(
            value["payload"]["players"][0]["player_id"],
            player_id.to_string()
        );
        assert!(value["meta"]["timestamp"].is_string());
    }

    #[test]
    fn test_type_names() {
        let presence = WebSocketMessage::presence(3).unwrap();
        let value = serde_json::to_value(&presence).unwrap();
        assert_eq!(value["type"], "PRESENCE");
        assert_eq!(value["payload"]["connected"], 3);

        let refresh = WebSocketMessage::refresh_content("round.advanced", Some(2)).unwrap();
        let value = serde_json::to_value(&refresh).unwrap();
        assert_eq!(value["type"], "REFRESH_CONTENT");
        assert_eq!(value["payload"]["round_number"], 2);

        for (message_type, name) in [
            (MessageType::SubmitStatus, "SUBMIT_STATUS"),
            (MessageType::AnswerStatus, "ANSWER_STATUS"),
            (MessageType::LiveResults, "LIVE_RESULTS"),
        ] {
            assert_eq!(serde_json::to_value(message_type).unwrap(), name);
        }
    }
}
