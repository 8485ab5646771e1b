use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::aggregation::{is_complete, is_correct, option_results, reveal_threshold};
use super::shuffle::shuffled_options;
use super::state_machine::{check_answerable, next_step, plan_play, require_phase, reveals_now, NextStep};
use super::types::{
    AnswerResponse, QuestionResponse, QuestionView, RoundResponse, ScoreboardView,
    SubmissionView, SubmitAnswerRequest, SubmitQuestionRequest, TriviaView,
};
use crate::event::{Event, EventBus, EventPayload};
use crate::shared::AppError;
use crate::store::{
    Lobby, LobbyPhase, NewAnswer, NewQuestion, Participation, Question, QuestionState,
    RecordAnswerResult, Round, RoundPhase, Store,
};

/// Trivia game rules: every state change is written to the store first and
/// only then published on the bus.
pub struct TriviaService {
    store: Arc<dyn Store>,
    event_bus: EventBus,
    shuffle_question_order: bool,
    /// Per-lobby locks around the count-and-reveal step so the reveal edge
    /// is seen once. Never held while publishing.
    reveal_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Outcome of recording a new answer, decided under the lobby's reveal lock
struct AnswerProgress {
    participant_count: usize,
    answered_count: usize,
    revealed_now: bool,
    already_revealed: bool,
}

impl TriviaService {
    pub fn new(store: Arc<dyn Store>, event_bus: EventBus, shuffle_question_order: bool) -> Self {
        Self {
            store,
            event_bus,
            shuffle_question_order,
            reveal_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Host moves the lobby out of the waiting room and opens round 1
    #[instrument(skip(self))]
    pub async fn start_game(&self, code: &str, player_id: Uuid) -> Result<RoundResponse, AppError> {
        let lobby = self.load_lobby(code).await?;
        self.require_host(&lobby, player_id).await?;

        if lobby.phase != LobbyPhase::Lobby {
            return Err(AppError::BadRequest("Game already started".to_string()));
        }

        let round = self.store.create_round(lobby.id, 1).await?;
        self.store
            .update_lobby_phase(lobby.id, LobbyPhase::Playing)
            .await?;

        info!(lobby_code = %code, "Game started");
        self.publish(
            &lobby,
            EventPayload::GameStarted {
                round_number: round.round_number,
            },
        )
        .await;

        Ok(RoundResponse::from(&round))
    }

    #[instrument(skip(self, request))]
    pub async fn submit_question(
        &self,
        code: &str,
        player_id: Uuid,
        request: SubmitQuestionRequest,
    ) -> Result<QuestionResponse, AppError> {
        let lobby = self.load_lobby(code).await?;
        self.require_participant(&lobby, player_id).await?;
        let round = self.active_round(&lobby).await?;
        require_phase(&round, RoundPhase::Submitting)?;

        let question_text = required_field("question_text", &request.question_text)?;
        let correct_answer = required_field("correct_answer", &request.correct_answer)?;
        let [w1, w2, w3] = &request.wrong_answers;
        let wrong_answers = [
            required_field("wrong_answers", w1)?,
            required_field("wrong_answers", w2)?,
            required_field("wrong_answers", w3)?,
        ];

        let mut options: Vec<&str> = wrong_answers.iter().map(String::as_str).collect();
        options.push(&correct_answer);
        options.sort_unstable();
        options.dedup();
        if options.len() != 4 {
            return Err(AppError::BadRequest(
                "Answer options must all be different".to_string(),
            ));
        }

        let existing = self.store.list_questions(round.id).await?;
        if existing.iter().any(|q| q.author_id == player_id) {
            return Err(AppError::Conflict(
                "You already submitted a question this round".to_string(),
            ));
        }

        let question = self
            .store
            .create_question(&NewQuestion {
                round_id: round.id,
                author_id: player_id,
                question_text,
                correct_answer,
                wrong_answers,
            })
            .await?;

        let participants = self.store.list_participants(lobby.id).await?;
        let submitted_count = existing.len() + 1;
        info!(
            lobby_code = %code,
            round_number = round.round_number,
            submitted_count,
            "Question submitted"
        );

        self.publish(
            &lobby,
            EventPayload::QuestionSubmitted {
                submitted_count,
                total_players: participants.len(),
                host_player_id: host_of(&participants),
            },
        )
        .await;

        Ok(QuestionResponse {
            id: question.id,
            round_number: round.round_number,
            question_text: question.question_text,
        })
    }

    /// Host closes submissions: questions get their display order and the
    /// first one goes live.
    #[instrument(skip(self))]
    pub async fn start_round_play(
        &self,
        code: &str,
        player_id: Uuid,
    ) -> Result<RoundResponse, AppError> {
        let lobby = self.load_lobby(code).await?;
        self.require_host(&lobby, player_id).await?;
        let round = self.active_round(&lobby).await?;
        require_phase(&round, RoundPhase::Submitting)?;

        let questions = self.store.list_questions(round.id).await?;
        let plan = {
            let mut rng = rand::rng();
            plan_play(&questions, self.shuffle_question_order, &mut rng)?
        };

        for (question_id, display_order) in &plan.order {
            self.store
                .update_question_order(*question_id, *display_order)
                .await?;
        }
        self.store
            .update_round_question_state(
                round.id,
                Some(plan.first_question),
                Some(QuestionState::Answering),
            )
            .await?;
        self.store
            .update_round_phase(round.id, RoundPhase::Playing)
            .await?;

        info!(
            lobby_code = %code,
            round_number = round.round_number,
            question_count = plan.order.len(),
            "Round play started"
        );
        self.publish(
            &lobby,
            EventPayload::RoundAdvanced {
                round_number: round.round_number,
            },
        )
        .await;

        // A lone player has nobody to wait for
        let revealed = self.reveal_if_complete(&lobby).await?;

        Ok(RoundResponse {
            round_number: round.round_number,
            phase: RoundPhase::Playing,
            current_question_id: Some(plan.first_question),
            question_state: Some(if revealed {
                QuestionState::Revealed
            } else {
                QuestionState::Answering
            }),
        })
    }

    /// Host moves to the next question, finishing the round after the last one
    #[instrument(skip(self))]
    pub async fn next_question(
        &self,
        code: &str,
        player_id: Uuid,
    ) -> Result<RoundResponse, AppError> {
        let lobby = self.load_lobby(code).await?;
        self.require_host(&lobby, player_id).await?;
        let round = self.active_round(&lobby).await?;
        require_phase(&round, RoundPhase::Playing)?;

        let questions = self.store.list_questions(round.id).await?;
        let mut response = match next_step(&questions, round.current_question_id)? {
            NextStep::Question(question_id) => {
                self.store
                    .update_round_question_state(
                        round.id,
                        Some(question_id),
                        Some(QuestionState::Answering),
                    )
                    .await?;
                debug!(lobby_code = %code, question_id = %question_id, "Advanced to next question");
                RoundResponse {
                    round_number: round.round_number,
                    phase: RoundPhase::Playing,
                    current_question_id: Some(question_id),
                    question_state: Some(QuestionState::Answering),
                }
            }
            NextStep::Finish => {
                self.store
                    .update_round_question_state(round.id, None, None)
                    .await?;
                self.store
                    .update_round_phase(round.id, RoundPhase::Finished)
                    .await?;
                info!(lobby_code = %code, round_number = round.round_number, "Round finished");
                RoundResponse {
                    round_number: round.round_number,
                    phase: RoundPhase::Finished,
                    current_question_id: None,
                    question_state: None,
                }
            }
        };

        self.publish(
            &lobby,
            EventPayload::RoundAdvanced {
                round_number: round.round_number,
            },
        )
        .await;

        if response.current_question_id.is_some() && self.reveal_if_complete(&lobby).await? {
            response.question_state = Some(QuestionState::Revealed);
        }

        Ok(response)
    }

    /// Host opens a fresh round after the previous one finished
    #[instrument(skip(self))]
    pub async fn play_again(&self, code: &str, player_id: Uuid) -> Result<RoundResponse, AppError> {
        let lobby = self.load_lobby(code).await?;
        self.require_host(&lobby, player_id).await?;

        let latest = self
            .store
            .get_latest_round(lobby.id)
            .await?
            .ok_or_else(|| AppError::BadRequest("Game has not started".to_string()))?;
        require_phase(&latest, RoundPhase::Finished)?;

        let round = self
            .store
            .create_round(lobby.id, latest.round_number + 1)
            .await?;

        info!(lobby_code = %code, round_number = round.round_number, "New round created");
        self.publish(
            &lobby,
            EventPayload::NewRoundCreated {
                round_number: round.round_number,
            },
        )
        .await;

        Ok(RoundResponse::from(&round))
    }

    /// Records a player's answer to the current question.
    ///
    /// A repeat submission keeps the first answer and publishes nothing.
    #[instrument(skip(self, request), fields(question_id = %request.question_id))]
    pub async fn submit_answer(
        &self,
        code: &str,
        player_id: Uuid,
        request: SubmitAnswerRequest,
    ) -> Result<AnswerResponse, AppError> {
        let lobby = self.load_lobby(code).await?;
        self.require_participant(&lobby, player_id).await?;
        let round = self.active_round(&lobby).await?;

        let question = self
            .store
            .list_questions(round.id)
            .await?
            .into_iter()
            .find(|q| q.id == request.question_id)
            .ok_or_else(|| {
                AppError::BadRequest("Question not found in active round".to_string())
            })?;
        check_answerable(&round, &question, player_id)?;

        if !shuffled_options(&question)
            .iter()
            .any(|option| option.value == request.answer)
        {
            return Err(AppError::BadRequest("Answer is not one of the options".to_string()));
        }

        let result = self
            .store
            .record_answer(&NewAnswer {
                question_id: question.id,
                player_id,
                selected_answer: request.answer.clone(),
                is_correct: is_correct(&question, &request.answer),
            })
            .await?;

        let answer = match result {
            RecordAnswerResult::AlreadyAnswered(answer) => {
                debug!(lobby_code = %code, player_id = %player_id, "Duplicate answer ignored");
                let participant_count = self.store.list_participants(lobby.id).await?.len();
                let answered_count = self.store.count_answers(question.id).await?;
                let round = self.active_round(&lobby).await?;
                let already_revealed = round.current_question_id == Some(question.id)
                    && round.question_state == Some(QuestionState::Revealed);
                return Ok(AnswerResponse {
                    question_id: question.id,
                    selected_answer: answer.selected_answer,
                    is_correct: answer.is_correct,
                    already_answered: true,
                    question_complete: already_revealed
                        || is_complete(answered_count, participant_count),
                });
            }
            RecordAnswerResult::Recorded(answer) => answer,
        };

        let progress = self.settle_answer(&lobby, &question).await?;
        let distribution = self.store.answer_distribution(question.id).await?;

        if progress.revealed_now {
            info!(lobby_code = %code, question_id = %question.id, "Question revealed");
            self.publish(
                &lobby,
                EventPayload::QuestionRevealed {
                    question_id: question.id,
                    distribution: distribution.clone(),
                },
            )
            .await;
        }

        let question_complete = progress.revealed_now
            || progress.already_revealed
            || is_complete(progress.answered_count, progress.participant_count);
        self.publish(
            &lobby,
            EventPayload::AnswerSubmitted {
                question_id: question.id,
                answered_count: progress.answered_count,
                total_expected: reveal_threshold(progress.participant_count),
                question_complete,
                distribution,
            },
        )
        .await;

        Ok(AnswerResponse {
            question_id: question.id,
            selected_answer: answer.selected_answer,
            is_correct: answer.is_correct,
            already_answered: false,
            question_complete,
        })
    }

    /// Counts answers and flips the question to revealed if this answer
    /// completed it. Only one caller per lobby runs this at a time.
    async fn settle_answer(
        &self,
        lobby: &Lobby,
        question: &Question,
    ) -> Result<AnswerProgress, AppError> {
        let lock = self.reveal_lock(lobby.id).await;
        let _guard = lock.lock().await;

        let participant_count = self.store.list_participants(lobby.id).await?.len();
        let answered_count = self.store.count_answers(question.id).await?;
        // Re-read under the lock so only one submission sees the answering state
        let round = self.active_round(lobby).await?;
        let is_current = round.current_question_id == Some(question.id);
        let already_revealed =
            is_current && round.question_state == Some(QuestionState::Revealed);
        let revealed_now = is_current && reveals_now(&round, answered_count, participant_count);

        if revealed_now {
            self.store
                .update_round_question_state(
                    round.id,
                    Some(question.id),
                    Some(QuestionState::Revealed),
                )
                .await?;
        }

        Ok(AnswerProgress {
            participant_count,
            answered_count,
            revealed_now,
            already_revealed,
        })
    }

    /// Reveals the current question if the answers already recorded meet the
    /// threshold, e.g. after a player left or when nobody else has to answer.
    /// Returns true if this call revealed it.
    #[instrument(skip(self, lobby), fields(lobby_code = %lobby.code))]
    pub async fn reveal_if_complete(&self, lobby: &Lobby) -> Result<bool, AppError> {
        let revealed = {
            let lock = self.reveal_lock(lobby.id).await;
            let _guard = lock.lock().await;

            let Some(round) = self.store.get_active_round(lobby.id).await? else {
                return Ok(false);
            };
            let Some(question_id) = round.current_question_id else {
                return Ok(false);
            };
            let participant_count = self.store.list_participants(lobby.id).await?.len();
            let answered_count = self.store.count_answers(question_id).await?;
            if !reveals_now(&round, answered_count, participant_count) {
                return Ok(false);
            }

            self.store
                .update_round_question_state(
                    round.id,
                    Some(question_id),
                    Some(QuestionState::Revealed),
                )
                .await?;
            question_id
        };

        let distribution = self.store.answer_distribution(revealed).await?;
        info!(lobby_code = %lobby.code, question_id = %revealed, "Question revealed");
        self.publish(
            lobby,
            EventPayload::QuestionRevealed {
                question_id: revealed,
                distribution,
            },
        )
        .await;
        Ok(true)
    }

    async fn reveal_lock(&self, lobby_id: Uuid) -> Arc<Mutex<()>> {
        self.reveal_locks
            .lock()
            .await
            .entry(lobby_id)
            .or_default()
            .clone()
    }

    /// Snapshot of the game from one player's point of view
    #[instrument(skip(self, lobby), fields(lobby_code = %lobby.code))]
    pub async fn content_view(&self, lobby: &Lobby, player_id: Uuid) -> Result<TriviaView, AppError> {
        let participants = self.store.list_participants(lobby.id).await?;
        let is_host = participants
            .iter()
            .any(|p| p.player_id == player_id && p.is_host);

        let mut view = TriviaView {
            lobby_code: lobby.code.clone(),
            lobby_phase: lobby.phase,
            is_host,
            round: None,
            submission: None,
            current_question: None,
            scoreboard: None,
        };

        if lobby.phase != LobbyPhase::Playing {
            return Ok(view);
        }

        let round = match self.store.get_active_round(lobby.id).await? {
            Some(round) => round,
            None => match self.store.get_latest_round(lobby.id).await? {
                Some(round) => round,
                None => {
                    warn!(lobby_code = %lobby.code, "Playing lobby has no rounds");
                    return Ok(view);
                }
            },
        };
        view.round = Some(RoundResponse::from(&round));

        match round.phase {
            RoundPhase::Submitting => {
                let questions = self.store.list_questions(round.id).await?;
                view.submission = Some(SubmissionView {
                    submitted_count: questions.len(),
                    total_players: participants.len(),
                    has_submitted: questions.iter().any(|q| q.author_id == player_id),
                });
            }
            RoundPhase::Playing => {
                view.current_question = self
                    .question_view(&round, player_id, participants.len())
                    .await?;
            }
            RoundPhase::Finished => {
                view.scoreboard = Some(ScoreboardView {
                    round: self.store.round_scoreboard(round.id).await?,
                    lobby: self.store.lobby_scoreboard(lobby.id).await?,
                });
            }
        }

        Ok(view)
    }

    async fn question_view(
        &self,
        round: &Round,
        player_id: Uuid,
        participant_count: usize,
    ) -> Result<Option<QuestionView>, AppError> {
        let Some(current_id) = round.current_question_id else {
            return Ok(None);
        };
        let questions = self.store.list_questions(round.id).await?;
        let Some((position, question)) = questions
            .iter()
            .enumerate()
            .find(|(_, q)| q.id == current_id)
        else {
            warn!(question_id = %current_id, "Current question missing from round");
            return Ok(None);
        };

        let answers = self.store.list_answers(question.id).await?;
        let has_answered = answers.iter().any(|a| a.player_id == player_id);
        let is_author = question.author_id == player_id;
        let revealed = round.question_state == Some(QuestionState::Revealed);

        let results = if has_answered || is_author || revealed {
            let distribution = self.store.answer_distribution(question.id).await?;
            Some(option_results(question, &distribution, revealed))
        } else {
            None
        };

        Ok(Some(QuestionView {
            id: question.id,
            question_text: question.question_text.clone(),
            position: position + 1,
            total_questions: questions.len(),
            options: shuffled_options(question),
            is_author,
            has_answered,
            answered_count: answers.len(),
            total_expected: reveal_threshold(participant_count),
            results,
        }))
    }

    /// The current question of a lobby's active round, if one is live
    pub async fn current_question(&self, lobby: &Lobby) -> Result<Option<Question>, AppError> {
        let Some(round) = self.store.get_active_round(lobby.id).await? else {
            return Ok(None);
        };
        let Some(current_id) = round.current_question_id else {
            return Ok(None);
        };
        Ok(self
            .store
            .list_questions(round.id)
            .await?
            .into_iter()
            .find(|q| q.id == current_id))
    }

    async fn load_lobby(&self, code: &str) -> Result<Lobby, AppError> {
        self.store
            .get_lobby_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lobby {} not found", code)))
    }

    async fn active_round(&self, lobby: &Lobby) -> Result<Round, AppError> {
        self.store
            .get_active_round(lobby.id)
            .await?
            .ok_or_else(|| AppError::BadRequest("No active round".to_string()))
    }

    async fn require_participant(
        &self,
        lobby: &Lobby,
        player_id: Uuid,
    ) -> Result<Participation, AppError> {
        self.store
            .get_participation(lobby.id, player_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("You are not in this lobby".to_string()))
    }

    async fn require_host(&self, lobby: &Lobby, player_id: Uuid) -> Result<(), AppError> {
        let participation = self.require_participant(lobby, player_id).await?;
        if !participation.is_host {
            warn!(lobby_code = %lobby.code, player_id = %player_id, "Non-host attempted host action");
            return Err(AppError::Forbidden(
                "Only the host can do that".to_string(),
            ));
        }
        Ok(())
    }

    async fn publish(&self, lobby: &Lobby, payload: EventPayload) {
        self.event_bus
            .publish(Event::new(lobby.code.clone(), payload))
            .await;
    }
}

/// Rejects blank input; the text itself is stored exactly as typed
fn required_field(name: &str, value: &str) -> Result<String, AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be empty", name)));
    }
    Ok(value.to_string())
}

fn host_of(participants: &[Participation]) -> Option<Uuid> {
    participants.iter().find(|p| p.is_host).map(|p| p.player_id)
}
