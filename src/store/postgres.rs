use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{
    Answer, AnswerStat, JoinLobbyResult, Lobby, LobbyPhase, NewAnswer, NewLobby, NewQuestion,
    Participation, Question, QuestionState, RecordAnswerResult, Round, RoundPhase, ScoreRow,
};
use super::repository::Store;
use crate::shared::AppError;

const LOBBY_COLUMNS: &str = "id, code, name, game_type, phase, created_at";
const PARTICIPATION_COLUMNS: &str = "lobby_id, player_id, nickname, is_host, joined_at";
const ROUND_COLUMNS: &str =
    "id, lobby_id, round_number, phase, current_question_id, question_state, created_at";
const QUESTION_COLUMNS: &str = "id, round_id, author_id, question_text, correct_answer, \
     wrong_answer_1, wrong_answer_2, wrong_answer_3, display_order, created_at";
const ANSWER_COLUMNS: &str =
    "id, question_id, player_id, selected_answer, is_correct, created_at";

/// PostgreSQL implementation of Store
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the schema in `migrations/`
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }
}

fn db_error(e: sqlx::Error) -> AppError {
    warn!(error = %e, "Database query failed");
    AppError::DatabaseError(e.to_string())
}

/// Maps unique violations to a conflict, everything else to a database error
fn conflict_or_db_error(e: sqlx::Error, conflict: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(conflict.to_string())
        }
        _ => db_error(e),
    }
}

fn parse_enum<T: FromStr>(value: &str) -> Result<T, AppError> {
    T::from_str(value)
        .map_err(|_| AppError::DatabaseError(format!("Unexpected enum value: {}", value)))
}

fn lobby_from_row(row: &PgRow) -> Result<Lobby, AppError> {
    let phase: String = row.get("phase");
    Ok(Lobby {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        game_type: row.get("game_type"),
        phase: parse_enum(&phase)?,
        created_at: row.get("created_at"),
    })
}

fn participation_from_row(row: &PgRow) -> Participation {
    Participation {
        lobby_id: row.get("lobby_id"),
        player_id: row.get("player_id"),
        nickname: row.get("nickname"),
        is_host: row.get("is_host"),
        joined_at: row.get("joined_at"),
    }
}

fn round_from_row(row: &PgRow) -> Result<Round, AppError> {
    let phase: String = row.get("phase");
    let question_state: Option<String> = row.get("question_state");
    Ok(Round {
        id: row.get("id"),
        lobby_id: row.get("lobby_id"),
        round_number: row.get("round_number"),
        phase: parse_enum(&phase)?,
        current_question_id: row.get("current_question_id"),
        question_state: question_state.as_deref().map(parse_enum::<QuestionState>).transpose()?,
        created_at: row.get("created_at"),
    })
}

fn question_from_row(row: &PgRow) -> Question {
    Question {
        id: row.get("id"),
        round_id: row.get("round_id"),
        author_id: row.get("author_id"),
        question_text: row.get("question_text"),
        correct_answer: row.get("correct_answer"),
        wrong_answers: [
            row.get("wrong_answer_1"),
            row.get("wrong_answer_2"),
            row.get("wrong_answer_3"),
        ],
        display_order: row.get("display_order"),
        created_at: row.get("created_at"),
    }
}

fn answer_from_row(row: &PgRow) -> Answer {
    Answer {
        id: row.get("id"),
        question_id: row.get("question_id"),
        player_id: row.get("player_id"),
        selected_answer: row.get("selected_answer"),
        is_correct: row.get("is_correct"),
        created_at: row.get("created_at"),
    }
}

fn score_from_row(row: &PgRow) -> ScoreRow {
    ScoreRow {
        player_id: row.get("player_id"),
        nickname: row.get("nickname"),
        correct_count: row.get("correct_count"),
    }
}

#[async_trait]
impl Store for PostgresStore {
    #[instrument(skip(self, lobby), fields(code = %lobby.code))]
    async fn create_lobby(&self, lobby: &NewLobby) -> Result<Lobby, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO lobbies (id, code, name, game_type, phase) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {LOBBY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&lobby.code)
        .bind(&lobby.name)
        .bind(&lobby.game_type)
        .bind(LobbyPhase::Lobby.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_db_error(e, "Lobby code already exists"))?;

        debug!("Lobby created in database");
        lobby_from_row(&row)
    }

    async fn get_lobby_by_code(&self, code: &str) -> Result<Option<Lobby>, AppError> {
        let row = sqlx::query(&format!("SELECT {LOBBY_COLUMNS} FROM lobbies WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(lobby_from_row).transpose()
    }

    async fn list_lobbies(&self) -> Result<Vec<Lobby>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {LOBBY_COLUMNS} FROM lobbies ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.iter().map(lobby_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn update_lobby_phase(&self, lobby_id: Uuid, phase: LobbyPhase) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE lobbies SET phase = $2 WHERE id = $1")
            .bind(lobby_id)
            .bind(phase.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lobby {} not found", lobby_id)));
        }
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
        let inserted = sqlx::query(&format!(
            "INSERT INTO lobby_players (lobby_id, player_id, nickname, is_host) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (lobby_id, player_id) DO NOTHING \
             RETURNING {PARTICIPATION_COLUMNS}"
        ))
        .bind(lobby_id)
        .bind(player_id)
        .bind(nickname)
        .bind(is_host)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or_db_error(e, "Lobby already has a host"))?;

        if let Some(row) = inserted {
            return Ok(JoinLobbyResult::Joined(participation_from_row(&row)));
        }

        self.get_participation(lobby_id, player_id)
            .await?
            .map(JoinLobbyResult::AlreadyJoined)
            .ok_or(AppError::Internal)
    }

    async fn remove_participant(&self, lobby_id: Uuid, player_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM lobby_players WHERE lobby_id = $1 AND player_id = $2")
            .bind(lobby_id)
            .bind(player_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_participation(
        &self,
        lobby_id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Participation>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM lobby_players WHERE lobby_id = $1 AND player_id = $2"
        ))
        .bind(lobby_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.as_ref().map(participation_from_row))
    }

    async fn list_participants(&self, lobby_id: Uuid) -> Result<Vec<Participation>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM lobby_players WHERE lobby_id = $1 ORDER BY joined_at"
        ))
        .bind(lobby_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.iter().map(participation_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn create_round(&self, lobby_id: Uuid, round_number: i32) -> Result<Round, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO trivia_rounds (id, lobby_id, round_number, phase) VALUES ($1, $2, $3, $4) \
             RETURNING {ROUND_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(lobby_id)
        .bind(round_number)
        .bind(RoundPhase::Submitting.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_db_error(e, "Lobby already has an active round"))?;
        round_from_row(&row)
    }

    async fn get_active_round(&self, lobby_id: Uuid) -> Result<Option<Round>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {ROUND_COLUMNS} FROM trivia_rounds WHERE lobby_id = $1 AND phase <> $2"
        ))
        .bind(lobby_id)
        .bind(RoundPhase::Finished.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.as_ref().map(round_from_row).transpose()
    }

    async fn get_latest_round(&self, lobby_id: Uuid) -> Result<Option<Round>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {ROUND_COLUMNS} FROM trivia_rounds WHERE lobby_id = $1 \
             ORDER BY round_number DESC LIMIT 1"
        ))
        .bind(lobby_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.as_ref().map(round_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn update_round_phase(&self, round_id: Uuid, phase: RoundPhase) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE trivia_rounds SET phase = $2 WHERE id = $1")
            .bind(round_id)
            .bind(phase.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Round {} not found", round_id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_round_question_state(
        &self,
        round_id: Uuid,
        current_question_id: Option<Uuid>,
        question_state: Option<QuestionState>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE trivia_rounds SET current_question_id = $2, question_state = $3 WHERE id = $1",
        )
        .bind(round_id)
        .bind(current_question_id)
        .bind(question_state.map(|s| s.to_string()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Round {} not found", round_id)));
        }
        Ok(())
    }

    #[instrument(skip(self, question), fields(round_id = %question.round_id))]
    async fn create_question(&self, question: &NewQuestion) -> Result<Question, AppError> {
        let [wrong_1, wrong_2, wrong_3] = &question.wrong_answers;
        let row = sqlx::query(&format!(
            "INSERT INTO trivia_questions (id, round_id, author_id, question_text, correct_answer, \
             wrong_answer_1, wrong_answer_2, wrong_answer_3) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(question.round_id)
        .bind(question.author_id)
        .bind(&question.question_text)
        .bind(&question.correct_answer)
        .bind(wrong_1)
        .bind(wrong_2)
        .bind(wrong_3)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(question_from_row(&row))
    }

    async fn list_questions(&self, round_id: Uuid) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUESTION_COLUMNS} FROM trivia_questions WHERE round_id = $1 \
             ORDER BY display_order ASC NULLS LAST, created_at ASC"
        ))
        .bind(round_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.iter().map(question_from_row).collect())
    }

    async fn update_question_order(
        &self,
        question_id: Uuid,
        display_order: i32,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE trivia_questions SET display_order = $2 WHERE id = $1")
            .bind(question_id)
            .bind(display_order)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Question {} not found",
                question_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, answer), fields(question_id = %answer.question_id, player_id = %answer.player_id))]
    async fn record_answer(&self, answer: &NewAnswer) -> Result<RecordAnswerResult, AppError> {
        // The unique (question_id, player_id) constraint makes the first write win
        let inserted = sqlx::query(&format!(
            "INSERT INTO trivia_answers (id, question_id, player_id, selected_answer, is_correct) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (question_id, player_id) DO NOTHING \
             RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(answer.question_id)
        .bind(answer.player_id)
        .bind(&answer.selected_answer)
        .bind(answer.is_correct)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        if let Some(row) = inserted {
            return Ok(RecordAnswerResult::Recorded(answer_from_row(&row)));
        }

        debug!("Answer already recorded, keeping the first one");
        let existing = sqlx::query(&format!(
            "SELECT {ANSWER_COLUMNS} FROM trivia_answers WHERE question_id = $1 AND player_id = $2"
        ))
        .bind(answer.question_id)
        .bind(answer.player_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(RecordAnswerResult::AlreadyAnswered(answer_from_row(
            &existing,
        )))
    }

    async fn list_answers(&self, question_id: Uuid) -> Result<Vec<Answer>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {ANSWER_COLUMNS} FROM trivia_answers WHERE question_id = $1 ORDER BY created_at"
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.iter().map(answer_from_row).collect())
    }

    async fn count_answers(&self, question_id: Uuid) -> Result<usize, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM trivia_answers WHERE question_id = $1")
            .bind(question_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        let count: i64 = row.get("count");
        Ok(count as usize)
    }

    async fn answer_distribution(&self, question_id: Uuid) -> Result<Vec<AnswerStat>, AppError> {
        let rows = sqlx::query(
            "SELECT selected_answer, COUNT(*) AS count FROM trivia_answers \
             WHERE question_id = $1 GROUP BY selected_answer",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows
            .iter()
            .map(|row| {
                let count: i64 = row.get("count");
                AnswerStat {
                    answer: row.get("selected_answer"),
                    count: count as usize,
                }
            })
            .collect())
    }

    async fn lobby_scoreboard(&self, lobby_id: Uuid) -> Result<Vec<ScoreRow>, AppError> {
        let rows = sqlx::query(
            "SELECT p.player_id, p.nickname, \
                    COUNT(a.id) FILTER (WHERE a.is_correct) AS correct_count \
             FROM lobby_players p \
             LEFT JOIN trivia_answers a ON a.player_id = p.player_id AND a.question_id IN ( \
                 SELECT q.id FROM trivia_questions q \
                 JOIN trivia_rounds r ON r.id = q.round_id \
                 WHERE r.lobby_id = $1) \
             WHERE p.lobby_id = $1 \
             GROUP BY p.player_id, p.nickname \
             ORDER BY correct_count DESC, p.nickname ASC",
        )
        .bind(lobby_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.iter().map(score_from_row).collect())
    }

    async fn round_scoreboard(&self, round_id: Uuid) -> Result<Vec<ScoreRow>, AppError> {
        let rows = sqlx::query(
            "SELECT p.player_id, p.nickname, \
                    COUNT(a.id) FILTER (WHERE a.is_correct) AS correct_count \
             FROM trivia_rounds r \
             JOIN lobby_players p ON p.lobby_id = r.lobby_id \
             LEFT JOIN trivia_answers a ON a.player_id = p.player_id AND a.question_id IN ( \
                 SELECT q.id FROM trivia_questions q WHERE q.round_id = r.id) \
             WHERE r.id = $1 \
             GROUP BY p.player_id, p.nickname \
             ORDER BY correct_count DESC, p.nickname ASC",
        )
        .bind(round_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.iter().map(score_from_row).collect())
    }
}
