use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::AnswerStat;

/// Something that happened in a lobby.
///
/// Events are facts about state changes that have already been committed to
/// the store. They are never persisted; they live for one publish cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub lobby_code: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(lobby_code: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            lobby_code: lobby_code.into(),
            payload,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

/// Event-specific data. Carries only what subscribers need to decide whether
/// and how to re-render; anything else is re-fetched from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    PlayerJoined {
        player_id: Uuid,
        nickname: String,
    },
    PlayerLeft {
        player_id: Uuid,
        nickname: String,
    },
    GameStarted {
        round_number: i32,
    },
    QuestionSubmitted {
        submitted_count: usize,
        total_players: usize,
        host_player_id: Option<Uuid>,
    },
    RoundAdvanced {
        round_number: i32,
    },
    /// Everyone expected to answer has answered
    QuestionRevealed {
        question_id: Uuid,
        distribution: Vec<AnswerStat>,
    },
    AnswerSubmitted {
        question_id: Uuid,
        answered_count: usize,
        total_expected: usize,
        question_complete: bool,
        distribution: Vec<AnswerStat>,
    },
    /// "Play again" opened a fresh round
    NewRoundCreated {
        round_number: i32,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::PlayerJoined { .. } => "player.joined",
            EventPayload::PlayerLeft { .. } => "player.left",
            EventPayload::GameStarted { .. } => "game.started",
            EventPayload::QuestionSubmitted { .. } => "question.submitted",
            EventPayload::RoundAdvanced { .. } => "round.advanced",
            EventPayload::QuestionRevealed { .. } => "question.revealed",
            EventPayload::AnswerSubmitted { .. } => "answer.submitted",
            EventPayload::NewRoundCreated { .. } => "round.created",
        }
    }
}
