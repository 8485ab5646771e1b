use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle of a lobby. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LobbyPhase {
    Lobby,
    Playing,
}

/// Lifecycle of a round: submitting -> playing -> finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoundPhase {
    Submitting,
    Playing,
    Finished,
}

/// State of the current question while a round is playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionState {
    Answering,
    Revealed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lobby {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub game_type: String,
    pub phase: LobbyPhase,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a lobby
#[derive(Debug, Clone)]
pub struct NewLobby {
    pub code: String,
    pub name: String,
    pub game_type: String,
}

/// A player's seat in a lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub lobby_id: Uuid,
    pub player_id: Uuid,
    pub nickname: String,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: Uuid,
    pub lobby_id: Uuid,
    pub round_number: i32,
    pub phase: RoundPhase,
    pub current_question_id: Option<Uuid>,
    pub question_state: Option<QuestionState>,
    pub created_at: DateTime<Utc>,
}

impl Round {
    /// A round is active until it finishes
    pub fn is_active(&self) -> bool {
        self.phase != RoundPhase::Finished
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub round_id: Uuid,
    pub author_id: Uuid,
    pub question_text: String,
    pub correct_answer: String,
    pub wrong_answers: [String; 3],
    pub display_order: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a question
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub round_id: Uuid,
    pub author_id: Uuid,
    pub question_text: String,
    pub correct_answer: String,
    pub wrong_answers: [String; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub player_id: Uuid,
    pub selected_answer: String,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for recording an answer
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_id: Uuid,
    pub player_id: Uuid,
    pub selected_answer: String,
    pub is_correct: bool,
}

/// Result of attempting to record an answer
#[derive(Debug, Clone, PartialEq)]
pub enum RecordAnswerResult {
    /// The answer was stored
    Recorded(Answer),
    /// The player had already answered this question; the original answer is returned untouched
    AlreadyAnswered(Answer),
}

/// Result of attempting to add a participant to a lobby
#[derive(Debug, Clone, PartialEq)]
pub enum JoinLobbyResult {
    Joined(Participation),
    AlreadyJoined(Participation),
}

/// Count of answers that picked a given option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerStat {
    pub answer: String,
    pub count: usize,
}

/// One scoreboard line: correct answers for a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub player_id: Uuid,
    pub nickname: String,
    pub correct_count: i64,
}
