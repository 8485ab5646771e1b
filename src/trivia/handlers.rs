use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use super::types::{
    AnswerResponse, QuestionResponse, RoundResponse, SubmitAnswerRequest, SubmitQuestionRequest,
};
use crate::identity::PlayerIdentity;
use crate::shared::{AppError, AppState};

/// POST /lobbies/:code/trivia/start
#[instrument(name = "start_game", skip(state))]
pub async fn start_game(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoundResponse>, AppError> {
    let round = state.trivia_service.start_game(&code, player_id).await?;
    Ok(Json(round))
}

/// POST /lobbies/:code/trivia/questions
#[instrument(name = "submit_question", skip(state, request))]
pub async fn submit_question(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(request): Json<SubmitQuestionRequest>,
) -> Result<Json<QuestionResponse>, AppError> {
    let question = state
        .trivia_service
        .submit_question(&code, player_id, request)
        .await?;
    Ok(Json(question))
}

/// POST /lobbies/:code/trivia/advance
///
/// Closes submissions and puts the first question live.
#[instrument(name = "advance_round", skip(state))]
pub async fn advance_round(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoundResponse>, AppError> {
    let round = state
        .trivia_service
        .start_round_play(&code, player_id)
        .await?;
    Ok(Json(round))
}

/// POST /lobbies/:code/trivia/next-question
#[instrument(name = "next_question", skip(state))]
pub async fn next_question(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoundResponse>, AppError> {
    let round = state.trivia_service.next_question(&code, player_id).await?;
    Ok(Json(round))
}

/// POST /lobbies/:code/trivia/play-again
#[instrument(name = "play_again", skip(state))]
pub async fn play_again(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoundResponse>, AppError> {
    let round = state.trivia_service.play_again(&code, player_id).await?;
    Ok(Json(round))
}

/// POST /lobbies/:code/trivia/answers
#[instrument(name = "submit_answer", skip(state, request))]
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(code): Path<String>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let answer = state
        .trivia_service
        .submit_answer(&code, player_id, request)
        .await?;

    info!(
        lobby_code = %code,
        player_id = %player_id,
        already_answered = answer.already_answered,
        question_complete = answer.question_complete,
        "Answer handled"
    );

    Ok(Json(answer))
}
