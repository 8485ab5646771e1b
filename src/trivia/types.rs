use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregation::OptionResult;
use super::shuffle::LabeledOption;
use crate::store::{LobbyPhase, QuestionState, Round, RoundPhase, ScoreRow};

/// Request payload for submitting a question
#[derive(Debug, Deserialize)]
pub struct SubmitQuestionRequest {
    pub question_text: String,
    pub correct_answer: String,
    pub wrong_answers: [String; 3],
}

/// Request payload for answering the current question
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub round_number: i32,
    pub question_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub question_id: Uuid,
    pub selected_answer: String,
    pub is_correct: bool,
    /// True when this was a repeat submission and the first answer was kept
    pub already_answered: bool,
    pub question_complete: bool,
}

/// Round state after a transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResponse {
    pub round_number: i32,
    pub phase: RoundPhase,
    pub current_question_id: Option<Uuid>,
    pub question_state: Option<QuestionState>,
}

impl From<&Round> for RoundResponse {
    fn from(round: &Round) -> Self {
        Self {
            round_number: round.round_number,
            phase: round.phase,
            current_question_id: round.current_question_id,
            question_state: round.question_state,
        }
    }
}

/// Everything a client needs to draw the trivia screen for one player
#[derive(Debug, Clone, Serialize)]
pub struct TriviaView {
    pub lobby_code: String,
    pub lobby_phase: LobbyPhase,
    pub is_host: bool,
    pub round: Option<RoundResponse>,
    pub submission: Option<SubmissionView>,
    pub current_question: Option<QuestionView>,
    pub scoreboard: Option<ScoreboardView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub submitted_count: usize,
    pub total_players: usize,
    pub has_submitted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub question_text: String,
    pub position: usize,
    pub total_questions: usize,
    pub options: Vec<LabeledOption>,
    pub is_author: bool,
    pub has_answered: bool,
    pub answered_count: usize,
    pub total_expected: usize,
    /// Present once the viewer has answered, wrote the question, or it was revealed
    pub results: Option<Vec<OptionResult>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreboardView {
    pub round: Vec<ScoreRow>,
    pub lobby: Vec<ScoreRow>,
}
