use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::models::{
    Answer, AnswerStat, JoinLobbyResult, Lobby, LobbyPhase, NewAnswer, NewLobby, NewQuestion,
    Participation, Question, QuestionState, RecordAnswerResult, Round, RoundPhase, ScoreRow,
};
use crate::shared::AppError;

/// Durable storage consumed by the game core.
///
/// Implementations own every persisted entity and are responsible for the
/// uniqueness guarantees the core relies on:
/// - lobby codes are unique
/// - one participation per (lobby, player)
/// - at most one non-finished round per lobby
/// - at most one answer per (question, player), first write wins
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_lobby(&self, lobby: &NewLobby) -> Result<Lobby, AppError>;
    async fn get_lobby_by_code(&self, code: &str) -> Result<Option<Lobby>, AppError>;
    async fn list_lobbies(&self) -> Result<Vec<Lobby>, AppError>;
    async fn update_lobby_phase(&self, lobby_id: Uuid, phase: LobbyPhase) -> Result<(), AppError>;

    async fn add_participant(
        &self,
        lobby_id: Uuid,
        player_id: Uuid,
        nickname: &str,
        is_host: bool,
    ) -> Result<JoinLobbyResult, AppError>;
    /// Returns false when the player was not in the lobby
    async fn remove_participant(&self, lobby_id: Uuid, player_id: Uuid) -> Result<bool, AppError>;
    async fn get_participation(
        &self,
        lobby_id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Participation>, AppError>;
    /// Participants in join order
    async fn list_participants(&self, lobby_id: Uuid) -> Result<Vec<Participation>, AppError>;

    /// Fails with `Conflict` if the lobby already has a non-finished round
    async fn create_round(&self, lobby_id: Uuid, round_number: i32) -> Result<Round, AppError>;
    /// The single non-finished round of a lobby, if any
    async fn get_active_round(&self, lobby_id: Uuid) -> Result<Option<Round>, AppError>;
    /// The round with the highest number, finished or not
    async fn get_latest_round(&self, lobby_id: Uuid) -> Result<Option<Round>, AppError>;
    async fn update_round_phase(&self, round_id: Uuid, phase: RoundPhase) -> Result<(), AppError>;
    async fn update_round_question_state(
        &self,
        round_id: Uuid,
        current_question_id: Option<Uuid>,
        question_state: Option<QuestionState>,
    ) -> Result<(), AppError>;

    async fn create_question(&self, question: &NewQuestion) -> Result<Question, AppError>;
    /// Questions ordered by display order (unordered ones last, in submission order)
    async fn list_questions(&self, round_id: Uuid) -> Result<Vec<Question>, AppError>;
    async fn update_question_order(
        &self,
        question_id: Uuid,
        display_order: i32,
    ) -> Result<(), AppError>;

    async fn record_answer(&self, answer: &NewAnswer) -> Result<RecordAnswerResult, AppError>;
    async fn list_answers(&self, question_id: Uuid) -> Result<Vec<Answer>, AppError>;
    async fn count_answers(&self, question_id: Uuid) -> Result<usize, AppError>;
    async fn answer_distribution(&self, question_id: Uuid) -> Result<Vec<AnswerStat>, AppError>;

    /// Correct answers per participant across every round of the lobby
    async fn lobby_scoreboard(&self, lobby_id: Uuid) -> Result<Vec<ScoreRow>, AppError>;
    /// Correct answers per participant for a single round
    async fn round_scoreboard(&self, round_id: Uuid) -> Result<Vec<ScoreRow>, AppError>;
}

#[derive(Default)]
struct StoreState {
    lobbies: Vec<Lobby>,
    participations: Vec<Participation>,
    rounds: Vec<Round>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
}

impl StoreState {
    fn round_mut(&mut self, round_id: Uuid) -> Result<&mut Round, AppError> {
        self.rounds
            .iter_mut()
            .find(|r| r.id == round_id)
            .ok_or_else(|| AppError::NotFound(format!("Round {} not found", round_id)))
    }

    fn scoreboard(&self, lobby_id: Uuid, question_ids: &[Uuid]) -> Vec<ScoreRow> {
        let mut correct: HashMap<Uuid, i64> = HashMap::new();
        for answer in self
            .answers
            .iter()
            .filter(|a| a.is_correct && question_ids.contains(&a.question_id))
        {
            *correct.entry(answer.player_id).or_default() += 1;
        }

        let mut rows: Vec<ScoreRow> = self
            .participations
            .iter()
            .filter(|p| p.lobby_id == lobby_id)
            .map(|p| ScoreRow {
                player_id: p.player_id,
                nickname: p.nickname.clone(),
                correct_count: correct.get(&p.player_id).copied().unwrap_or(0),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.correct_count
                .cmp(&a.correct_count)
                .then_with(|| a.nickname.cmp(&b.nickname))
        });
        rows
    }
}

/// In-memory implementation of Store for development and testing
///
/// A single mutex guards every table so each operation is atomic, which is
/// what makes the existence checks below safe against concurrent writers.
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    #[instrument(skip(self, lobby), fields(code = %lobby.code))]
    async fn create_lobby(&self, lobby: &NewLobby) -> Result<Lobby, AppError> {
        let mut state = self.state.lock().await;
        if state.lobbies.iter().any(|l| l.code == lobby.code) {
            warn!(code = %lobby.code, "Lobby code already in use");
            return Err(AppError::Conflict(format!(
                "Lobby code {} already exists",
                lobby.code
            )));
        }

        let created = Lobby {
            id: Uuid::new_v4(),
            code: lobby.code.clone(),
            name: lobby.name.clone(),
            game_type: lobby.game_type.clone(),
            phase: LobbyPhase::Lobby,
            created_at: Utc::now(),
        };
        state.lobbies.push(created.clone());

        debug!(lobby_id = %created.id, "Lobby created in memory");
        Ok(created)
    }

    async fn get_lobby_by_code(&self, code: &str) -> Result<Option<Lobby>, AppError> {
        let state = self.state.lock().await;
        Ok(state.lobbies.iter().find(|l| l.code == code).cloned())
    }

    async fn list_lobbies(&self) -> Result<Vec<Lobby>, AppError> {
        let state = self.state.lock().await;
        let mut lobbies = state.lobbies.clone();
        lobbies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(lobbies)
    }

    #[instrument(skip(self))]
    async fn update_lobby_phase(&self, lobby_id: Uuid, phase: LobbyPhase) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let lobby = state
            .lobbies
            .iter_mut()
            .find(|l| l.id == lobby_id)
            .ok_or_else(|| AppError::NotFound(format!("Lobby {} not found", lobby_id)))?;
        lobby.phase = phase;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_participant(
        &self,
        lobby_id: Uuid,
        player_id: Uuid,
        nickname: &str,
        is_host: bool,
    ) -> Result<JoinLobbyResult, AppError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .participations
            .iter()
            .find(|p| p.lobby_id == lobby_id && p.player_id == player_id)
        {
            debug!("Player already participates in lobby");
            return Ok(JoinLobbyResult::AlreadyJoined(existing.clone()));
        }
        if is_host
            && state
                .participations
                .iter()
                .any(|p| p.lobby_id == lobby_id && p.is_host)
        {
            return Err(AppError::Conflict("Lobby already has a host".to_string()));
        }

        let participation = Participation {
            lobby_id,
            player_id,
            nickname: nickname.to_string(),
            is_host,
            joined_at: Utc::now(),
        };
        state.participations.push(participation.clone());

        info!(nickname = %nickname, "Player added to lobby");
        Ok(JoinLobbyResult::Joined(participation))
    }

    async fn remove_participant(&self, lobby_id: Uuid, player_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        let before = state.participations.len();
        state
            .participations
            .retain(|p| !(p.lobby_id == lobby_id && p.player_id == player_id));
        Ok(state.participations.len() != before)
    }

    async fn get_participation(
        &self,
        lobby_id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Participation>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .participations
            .iter()
            .find(|p| p.lobby_id == lobby_id && p.player_id == player_id)
            .cloned())
    }

    async fn list_participants(&self, lobby_id: Uuid) -> Result<Vec<Participation>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .participations
            .iter()
            .filter(|p| p.lobby_id == lobby_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn create_round(&self, lobby_id: Uuid, round_number: i32) -> Result<Round, AppError> {
        let mut state = self.state.lock().await;
        if state
            .rounds
            .iter()
            .any(|r| r.lobby_id == lobby_id && r.is_active())
        {
            warn!("Lobby already has an active round");
            return Err(AppError::Conflict(
                "Lobby already has an active round".to_string(),
            ));
        }

        let round = Round {
            id: Uuid::new_v4(),
            lobby_id,
            round_number,
            phase: RoundPhase::Submitting,
            current_question_id: None,
            question_state: None,
            created_at: Utc::now(),
        };
        state.rounds.push(round.clone());

        debug!(round_id = %round.id, "Round created in memory");
        Ok(round)
    }

    async fn get_active_round(&self, lobby_id: Uuid) -> Result<Option<Round>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .rounds
            .iter()
            .find(|r| r.lobby_id == lobby_id && r.is_active())
            .cloned())
    }

    async fn get_latest_round(&self, lobby_id: Uuid) -> Result<Option<Round>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .rounds
            .iter()
            .filter(|r| r.lobby_id == lobby_id)
            .max_by_key(|r| r.round_number)
            .cloned())
    }

    #[instrument(skip(self))]
    async fn update_round_phase(&self, round_id: Uuid, phase: RoundPhase) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.round_mut(round_id)?.phase = phase;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_round_question_state(
        &self,
        round_id: Uuid,
        current_question_id: Option<Uuid>,
        question_state: Option<QuestionState>,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let round = state.round_mut(round_id)?;
        round.current_question_id = current_question_id;
        round.question_state = question_state;
        Ok(())
    }

    #[instrument(skip(self, question), fields(round_id = %question.round_id))]
    async fn create_question(&self, question: &NewQuestion) -> Result<Question, AppError> {
        let mut state = self.state.lock().await;
        if !state.rounds.iter().any(|r| r.id == question.round_id) {
            return Err(AppError::NotFound(format!(
                "Round {} not found",
                question.round_id
            )));
        }

        let created = Question {
            id: Uuid::new_v4(),
            round_id: question.round_id,
            author_id: question.author_id,
            question_text: question.question_text.clone(),
            correct_answer: question.correct_answer.clone(),
            wrong_answers: question.wrong_answers.clone(),
            display_order: None,
            created_at: Utc::now(),
        };
        state.questions.push(created.clone());
        Ok(created)
    }

    async fn list_questions(&self, round_id: Uuid) -> Result<Vec<Question>, AppError> {
        let state = self.state.lock().await;
        let mut questions: Vec<Question> = state
            .questions
            .iter()
            .filter(|q| q.round_id == round_id)
            .cloned()
            .collect();
        // Stable sort keeps submission order among unordered questions
        questions.sort_by_key(|q| (q.display_order.is_none(), q.display_order));
        Ok(questions)
    }

    async fn update_question_order(
        &self,
        question_id: Uuid,
        display_order: i32,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let question = state
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", question_id)))?;
        question.display_order = Some(display_order);
        Ok(())
    }

    #[instrument(skip(self, answer), fields(question_id = %answer.question_id, player_id = %answer.player_id))]
    async fn record_answer(&self, answer: &NewAnswer) -> Result<RecordAnswerResult, AppError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .answers
            .iter()
            .find(|a| a.question_id == answer.question_id && a.player_id == answer.player_id)
        {
            debug!("Answer already recorded, keeping the first one");
            return Ok(RecordAnswerResult::AlreadyAnswered(existing.clone()));
        }

        let recorded = Answer {
            id: Uuid::new_v4(),
            question_id: answer.question_id,
            player_id: answer.player_id,
            selected_answer: answer.selected_answer.clone(),
            is_correct: answer.is_correct,
            created_at: Utc::now(),
        };
        state.answers.push(recorded.clone());
        Ok(RecordAnswerResult::Recorded(recorded))
    }

    async fn list_answers(&self, question_id: Uuid) -> Result<Vec<Answer>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .answers
            .iter()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn count_answers(&self, question_id: Uuid) -> Result<usize, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .answers
            .iter()
            .filter(|a| a.question_id == question_id)
            .count())
    }

    async fn answer_distribution(&self, question_id: Uuid) -> Result<Vec<AnswerStat>, AppError> {
        let state = self.state.lock().await;
        let mut stats: Vec<AnswerStat> = Vec::new();
        for answer in state.answers.iter().filter(|a| a.question_id == question_id) {
            match stats.iter_mut().find(|s| s.answer == answer.selected_answer) {
                Some(stat) => stat.count += 1,
                None => stats.push(AnswerStat {
                    answer: answer.selected_answer.clone(),
                    count: 1,
                }),
            }
        }
        Ok(stats)
    }

    async fn lobby_scoreboard(&self, lobby_id: Uuid) -> Result<Vec<ScoreRow>, AppError> {
        let state = self.state.lock().await;
        let round_ids: Vec<Uuid> = state
            .rounds
            .iter()
            .filter(|r| r.lobby_id == lobby_id)
            .map(|r| r.id)
            .collect();
        let question_ids: Vec<Uuid> = state
            .questions
            .iter()
            .filter(|q| round_ids.contains(&q.round_id))
            .map(|q| q.id)
            .collect();
        Ok(state.scoreboard(lobby_id, &question_ids))
    }

    async fn round_scoreboard(&self, round_id: Uuid) -> Result<Vec<ScoreRow>, AppError> {
        let state = self.state.lock().await;
        let lobby_id = state
            .rounds
            .iter()
            .find(|r| r.id == round_id)
            .map(|r| r.lobby_id)
            .ok_or_else(|| AppError::NotFound(format!("Round {} not found", round_id)))?;
        let question_ids: Vec<Uuid> = state
            .questions
            .iter()
            .filter(|q| q.round_id == round_id)
            .map(|q| q.id)
            .collect();
        Ok(state.scoreboard(lobby_id, &question_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_lobby(store: &InMemoryStore) -> Lobby {
        store
            .create_lobby(&NewLobby {
                code: "ABC123".to_string(),
                name: "Friday quiz".to_string(),
                game_type: "trivia".to_string(),
            })
            .await
            .unwrap()
    }

    fn new_question(round_id: Uuid, author_id: Uuid, text: &str) -> NewQuestion {
        NewQuestion {
            round_id,
            author_id,
            question_text: text.to_string(),
            correct_answer: "Paris".to_string(),
            wrong_answers: [
                "Lyon".to_string(),
                "Nice".to_string(),
                "Lille".to_string(),
            ],
        }
    }

    #[tokio::test]
    async fn test_lobby_code_is_unique() {
        let store = InMemoryStore::new();
        seeded_lobby(&store).await;

        let duplicate = store
            .create_lobby(&NewLobby {
                code: "ABC123".to_string(),
                name: "Other".to_string(),
                game_type: "trivia".to_string(),
            })
            .await;

        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_add_participant_is_idempotent() {
        let store = InMemoryStore::new();
        let lobby = seeded_lobby(&store).await;
        let player = Uuid::new_v4();

        let first = store
            .add_participant(lobby.id, player, "alice", true)
            .await
            .unwrap();
        let second = store
            .add_participant(lobby.id, player, "alice-again", true)
            .await
            .unwrap();

        assert!(matches!(first, JoinLobbyResult::Joined(_)));
        match second {
            JoinLobbyResult::AlreadyJoined(p) => assert_eq!(p.nickname, "alice"),
            other => panic!("expected AlreadyJoined, got {:?}", other),
        }
        assert_eq!(store.list_participants(lobby.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_host_is_rejected() {
        let store = InMemoryStore::new();
        let lobby = seeded_lobby(&store).await;
        store
            .add_participant(lobby.id, Uuid::new_v4(), "alice", true)
            .await
            .unwrap();

        let result = store
            .add_participant(lobby.id, Uuid::new_v4(), "bob", true)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_only_one_active_round_per_lobby() {
        let store = InMemoryStore::new();
        let lobby = seeded_lobby(&store).await;

        let round = store.create_round(lobby.id, 1).await.unwrap();
        assert!(matches!(
            store.create_round(lobby.id, 2).await,
            Err(AppError::Conflict(_))
        ));

        store
            .update_round_phase(round.id, RoundPhase::Finished)
            .await
            .unwrap();
        let next = store.create_round(lobby.id, 2).await.unwrap();

        assert_eq!(store.get_active_round(lobby.id).await.unwrap(), Some(next.clone()));
        assert_eq!(store.get_latest_round(lobby.id).await.unwrap(), Some(next));
    }

    #[tokio::test]
    async fn test_questions_follow_display_order() {
        let store = InMemoryStore::new();
        let lobby = seeded_lobby(&store).await;
        let round = store.create_round(lobby.id, 1).await.unwrap();
        let author = Uuid::new_v4();

        let q1 = store.create_question(&new_question(round.id, author, "one")).await.unwrap();
        let q2 = store.create_question(&new_question(round.id, author, "two")).await.unwrap();
        let q3 = store.create_question(&new_question(round.id, author, "three")).await.unwrap();

        let unordered = store.list_questions(round.id).await.unwrap();
        assert_eq!(
            unordered.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![q1.id, q2.id, q3.id]
        );

        store.update_question_order(q3.id, 1).await.unwrap();
        store.update_question_order(q1.id, 2).await.unwrap();
        store.update_question_order(q2.id, 3).await.unwrap();

        let ordered = store.list_questions(round.id).await.unwrap();
        assert_eq!(
            ordered.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![q3.id, q1.id, q2.id]
        );
    }

    #[tokio::test]
    async fn test_record_answer_keeps_first_submission() {
        let store = InMemoryStore::new();
        let lobby = seeded_lobby(&store).await;
        let round = store.create_round(lobby.id, 1).await.unwrap();
        let question = store
            .create_question(&new_question(round.id, Uuid::new_v4(), "capital?"))
            .await
            .unwrap();
        let player = Uuid::new_v4();

        let first = store
            .record_answer(&NewAnswer {
                question_id: question.id,
                player_id: player,
                selected_answer: "Paris".to_string(),
                is_correct: true,
            })
            .await
            .unwrap();
        let distribution_before = store.answer_distribution(question.id).await.unwrap();

        let second = store
            .record_answer(&NewAnswer {
                question_id: question.id,
                player_id: player,
                selected_answer: "Lyon".to_string(),
                is_correct: false,
            })
            .await
            .unwrap();

        assert!(matches!(first, RecordAnswerResult::Recorded(_)));
        match second {
            RecordAnswerResult::AlreadyAnswered(a) => assert_eq!(a.selected_answer, "Paris"),
            other => panic!("expected AlreadyAnswered, got {:?}", other),
        }
        assert_eq!(store.count_answers(question.id).await.unwrap(), 1);
        assert_eq!(
            store.answer_distribution(question.id).await.unwrap(),
            distribution_before
        );
    }

    #[tokio::test]
    async fn test_scoreboards_count_correct_answers() {
        let store = InMemoryStore::new();
        let lobby = seeded_lobby(&store).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.add_participant(lobby.id, alice, "alice", true).await.unwrap();
        store.add_participant(lobby.id, bob, "bob", false).await.unwrap();

        let round1 = store.create_round(lobby.id, 1).await.unwrap();
        let q1 = store.create_question(&new_question(round1.id, alice, "q1")).await.unwrap();
        store
            .record_answer(&NewAnswer {
                question_id: q1.id,
                player_id: bob,
                selected_answer: "Paris".to_string(),
                is_correct: true,
            })
            .await
            .unwrap();
        store.update_round_phase(round1.id, RoundPhase::Finished).await.unwrap();

        let round2 = store.create_round(lobby.id, 2).await.unwrap();
        let q2 = store.create_question(&new_question(round2.id, bob, "q2")).await.unwrap();
        store
            .record_answer(&NewAnswer {
                question_id: q2.id,
                player_id: alice,
                selected_answer: "Nice".to_string(),
                is_correct: false,
            })
            .await
            .unwrap();

        let lobby_rows = store.lobby_scoreboard(lobby.id).await.unwrap();
        assert_eq!(lobby_rows[0].nickname, "bob");
        assert_eq!(lobby_rows[0].correct_count, 1);
        assert_eq!(lobby_rows[1].correct_count, 0);

        let round_rows = store.round_scoreboard(round2.id).await.unwrap();
        assert!(round_rows.iter().all(|r| r.correct_count == 0));
        assert_eq!(round_rows.len(), 2);
    }
}
