// Trivia: players write questions for each other, then answer them live

pub use game::{TriviaGame, TRIVIA_SLUG};
pub use handlers::{
    advance_round, next_question, play_again, start_game, submit_answer, submit_question,
};
pub use service::TriviaService;
pub use types::{
    AnswerResponse, QuestionResponse, RoundResponse, SubmitAnswerRequest, SubmitQuestionRequest,
    TriviaView,
};

pub mod aggregation;
mod game;
mod handlers;
mod service;
pub mod shuffle;
pub mod state_machine;
mod types;
