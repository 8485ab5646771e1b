use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::aggregation::{option_results, OptionResult};
use super::service::TriviaService;
use crate::event::{Event, EventPayload};
use crate::games::{Game, GameInfo};
use crate::shared::AppError;
use crate::store::{AnswerStat, Lobby, Store};
use crate::websockets::{Hub, MessageType, WebSocketMessage};

pub const TRIVIA_SLUG: &str = "trivia";

#[derive(Debug, Serialize)]
struct SubmitStatusPayload {
    submitted_count: usize,
    total_players: usize,
    is_host: bool,
    can_start: bool,
}

#[derive(Debug, Serialize)]
struct AnswerStatusPayload {
    answered_count: usize,
    total_expected: usize,
}

#[derive(Debug, Serialize)]
struct LiveResultsPayload {
    question_id: Uuid,
    answered_count: usize,
    total_expected: usize,
    results: Vec<OptionResult>,
}

/// The trivia variant: pushes live updates for trivia events and builds the
/// per-player game snapshot.
pub struct TriviaGame {
    service: Arc<TriviaService>,
    store: Arc<dyn Store>,
}

impl TriviaGame {
    pub fn new(service: Arc<TriviaService>, store: Arc<dyn Store>) -> Self {
        Self { service, store }
    }

    async fn broadcast_submit_status(
        &self,
        hub: &Hub,
        lobby_code: &str,
        submitted_count: usize,
        total_players: usize,
        host_player_id: Option<Uuid>,
    ) {
        hub.broadcast_personalized(lobby_code, |player_id| {
            let is_host = host_player_id == Some(player_id);
            render(
                MessageType::SubmitStatus,
                SubmitStatusPayload {
                    submitted_count,
                    total_players,
                    is_host,
                    can_start: is_host && submitted_count > 0,
                },
            )
        })
        .await;
    }

    /// Players who answered and the author see live results; everyone else
    /// only sees how many have answered.
    async fn broadcast_answer_progress(
        &self,
        hub: &Hub,
        lobby_code: &str,
        question_id: Uuid,
        answered_count: usize,
        total_expected: usize,
        distribution: &[AnswerStat],
    ) -> Result<(), AppError> {
        let Some(lobby) = self.store.get_lobby_by_code(lobby_code).await? else {
            return Err(AppError::NotFound(format!("Lobby {} not found", lobby_code)));
        };
        // The host may have moved on since the answer was recorded
        let question = match self.service.current_question(&lobby).await? {
            Some(question) if question.id == question_id => question,
            _ => {
                debug!(
                    lobby_code = %lobby_code,
                    question_id = %question_id,
                    "Answered question is no longer current, skipping live results"
                );
                return Ok(());
            }
        };

        let answered: HashSet<Uuid> = self
            .store
            .list_answers(question.id)
            .await?
            .into_iter()
            .map(|answer| answer.player_id)
            .collect();

        let live_results = render(
            MessageType::LiveResults,
            LiveResultsPayload {
                question_id: question.id,
                answered_count,
                total_expected,
                results: option_results(&question, distribution, false),
            },
        );
        let answer_status = render(
            MessageType::AnswerStatus,
            AnswerStatusPayload {
                answered_count,
                total_expected,
            },
        );

        hub.broadcast_personalized(lobby_code, |player_id| {
            if answered.contains(&player_id) || question.author_id == player_id {
                live_results.clone()
            } else {
                answer_status.clone()
            }
        })
        .await;
        Ok(())
    }

    async fn broadcast_refresh(&self, hub: &Hub, event: &Event, round_number: Option<i32>) {
        if let Some(message) = render_message(WebSocketMessage::refresh_content(
            event.event_type(),
            round_number,
        )) {
            hub.broadcast(&event.lobby_code, &message).await;
        }
    }
}

#[async_trait]
impl Game for TriviaGame {
    fn info(&self) -> GameInfo {
        GameInfo {
            slug: TRIVIA_SLUG.to_string(),
            name: "Trivia".to_string(),
            description: "Questions from minds you know".to_string(),
            ready: true,
        }
    }

    async fn handle_event(&self, event: &Event, hub: &Hub) -> bool {
        match &event.payload {
            EventPayload::GameStarted { round_number }
            | EventPayload::RoundAdvanced { round_number }
            | EventPayload::NewRoundCreated { round_number } => {
                self.broadcast_refresh(hub, event, Some(*round_number)).await;
                true
            }
            EventPayload::QuestionRevealed { .. } => {
                self.broadcast_refresh(hub, event, None).await;
                true
            }
            EventPayload::QuestionSubmitted {
                submitted_count,
                total_players,
                host_player_id,
            } => {
                self.broadcast_submit_status(
                    hub,
                    &event.lobby_code,
                    *submitted_count,
                    *total_players,
                    *host_player_id,
                )
                .await;
                true
            }
            EventPayload::AnswerSubmitted {
                question_id,
                answered_count,
                total_expected,
                question_complete,
                distribution,
            } => {
                // The reveal already refreshed everyone
                if *question_complete {
                    return true;
                }
                if let Err(e) = self
                    .broadcast_answer_progress(
                        hub,
                        &event.lobby_code,
                        *question_id,
                        *answered_count,
                        *total_expected,
                        distribution,
                    )
                    .await
                {
                    warn!(lobby_code = %event.lobby_code, error = %e, "Failed to send answer progress");
                }
                true
            }
            EventPayload::PlayerJoined { .. } | EventPayload::PlayerLeft { .. } => false,
        }
    }

    async fn content_view(
        &self,
        lobby: &Lobby,
        player_id: Uuid,
    ) -> Result<serde_json::Value, AppError> {
        let view = self.service.content_view(lobby, player_id).await?;
        Ok(serde_json::to_value(view)?)
    }

    /// One fewer expected answer can complete the current question
    async fn player_left(&self, lobby: &Lobby) -> Result<(), AppError> {
        self.service.reveal_if_complete(lobby).await?;
        Ok(())
    }
}

fn render<T: Serialize>(message_type: MessageType, payload: T) -> Option<String> {
    render_message(WebSocketMessage::new(message_type, payload))
}

fn render_message(message: Result<WebSocketMessage, serde_json::Error>) -> Option<String> {
    match message.and_then(|m| m.to_json()) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to render websocket message");
            None
        }
    }
}
