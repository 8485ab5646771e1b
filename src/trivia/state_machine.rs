//! Pure round/question transitions. The service loads state from the store,
//! asks these functions what should happen, then persists the outcome.

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use super::aggregation::is_complete;
use crate::shared::AppError;
use crate::store::{Question, QuestionState, Round, RoundPhase};

/// Display order assignment for a round moving from submitting to playing
#[derive(Debug, Clone, PartialEq)]
pub struct PlayPlan {
    /// (question id, 1-based display order)
    pub order: Vec<(Uuid, i32)>,
    pub first_question: Uuid,
}

/// Orders the submitted questions, shuffled when `shuffle` is set, otherwise
/// in submission order. Refuses a round with no questions.
pub fn plan_play<R: Rng + ?Sized>(
    questions: &[Question],
    shuffle: bool,
    rng: &mut R,
) -> Result<PlayPlan, AppError> {
    let mut ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    if shuffle {
        ids.shuffle(rng);
    }

    let first_question = *ids
        .first()
        .ok_or_else(|| AppError::BadRequest("No questions have been submitted".to_string()))?;

    let order = ids
        .into_iter()
        .zip(1..)
        .collect();

    Ok(PlayPlan {
        order,
        first_question,
    })
}

/// What advancing past the current question does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Question(Uuid),
    Finish,
}

/// `questions` must already be in display order.
pub fn next_step(questions: &[Question], current: Option<Uuid>) -> Result<NextStep, AppError> {
    let Some(current) = current else {
        return Ok(questions
            .first()
            .map_or(NextStep::Finish, |q| NextStep::Question(q.id)));
    };

    let position = questions
        .iter()
        .position(|q| q.id == current)
        .ok_or_else(|| AppError::BadRequest("Current question is not in this round".to_string()))?;

    Ok(questions
        .get(position + 1)
        .map_or(NextStep::Finish, |q| NextStep::Question(q.id)))
}

pub fn require_phase(round: &Round, expected: RoundPhase) -> Result<(), AppError> {
    if round.phase != expected {
        return Err(AppError::BadRequest(format!(
            "Round {} is {}, expected {}",
            round.round_number, round.phase, expected
        )));
    }
    Ok(())
}

/// Checks that `player_id` may answer `question` right now
pub fn check_answerable(round: &Round, question: &Question, player_id: Uuid) -> Result<(), AppError> {
    require_phase(round, RoundPhase::Playing)?;

    if question.round_id != round.id || round.current_question_id != Some(question.id) {
        return Err(AppError::BadRequest(
            "Question is not the current question".to_string(),
        ));
    }
    if question.author_id == player_id {
        return Err(AppError::BadRequest(
            "Authors cannot answer their own question".to_string(),
        ));
    }
    Ok(())
}

/// True exactly when a new answer moves the current question from answering to revealed
pub fn reveals_now(round: &Round, answer_count: usize, participant_count: usize) -> bool {
    round.question_state == Some(QuestionState::Answering)
        && is_complete(answer_count, participant_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn question(round_id: Uuid, author_id: Uuid) -> Question {
        Question {
            id: Uuid::new_v4(),
            round_id,
            author_id,
            question_text: "Q?".to_string(),
            correct_answer: "yes".to_string(),
            wrong_answers: ["a".to_string(), "b".to_string(), "c".to_string()],
            display_order: None,
            created_at: Utc::now(),
        }
    }

    fn round(phase: RoundPhase) -> Round {
        Round {
            id: Uuid::new_v4(),
            lobby_id: Uuid::new_v4(),
            round_number: 1,
            phase,
            current_question_id: None,
            question_state: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_refuses_empty_round() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            plan_play(&[], true, &mut rng),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_plan_keeps_submission_order_without_shuffle() {
        let round_id = Uuid::new_v4();
        let questions: Vec<Question> = (0..3)
            .map(|_| question(round_id, Uuid::new_v4()))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);

        let plan = plan_play(&questions, false, &mut rng).unwrap();

        assert_eq!(plan.first_question, questions[0].id);
        assert_eq!(
            plan.order,
            vec![
                (questions[0].id, 1),
                (questions[1].id, 2),
                (questions[2].id, 3)
            ]
        );
    }

    #[test]
    fn test_plan_shuffle_assigns_every_question_once() {
        let round_id = Uuid::new_v4();
        let questions: Vec<Question> = (0..5)
            .map(|_| question(round_id, Uuid::new_v4()))
            .collect();
        let mut rng = StdRng::seed_from_u64(99);

        let plan = plan_play(&questions, true, &mut rng).unwrap();

        let mut ids: Vec<Uuid> = plan.order.iter().map(|(id, _)| *id).collect();
        let orders: Vec<i32> = plan.order.iter().map(|(_, n)| *n).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert_eq!(plan.first_question, ids[0]);
        ids.sort();
        let mut expected: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_next_step_walks_then_finishes() {
        let round_id = Uuid::new_v4();
        let questions: Vec<Question> = (0..2)
            .map(|_| question(round_id, Uuid::new_v4()))
            .collect();

        assert_eq!(
            next_step(&questions, None).unwrap(),
            NextStep::Question(questions[0].id)
        );
        assert_eq!(
            next_step(&questions, Some(questions[0].id)).unwrap(),
            NextStep::Question(questions[1].id)
        );
        assert_eq!(
            next_step(&questions, Some(questions[1].id)).unwrap(),
            NextStep::Finish
        );
        assert!(next_step(&questions, Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_only_current_question_is_answerable_by_non_authors() {
        let author = Uuid::new_v4();
        let player = Uuid::new_v4();
        let mut playing = round(RoundPhase::Playing);
        let current = question(playing.id, author);
        let other = question(playing.id, author);
        playing.current_question_id = Some(current.id);
        playing.question_state = Some(QuestionState::Answering);

        assert!(check_answerable(&playing, &current, player).is_ok());
        assert!(check_answerable(&playing, &current, author).is_err());
        assert!(check_answerable(&playing, &other, player).is_err());

        let submitting = round(RoundPhase::Submitting);
        let q = question(submitting.id, author);
        assert!(check_answerable(&submitting, &q, player).is_err());
    }

    #[test]
    fn test_reveal_happens_once_on_threshold() {
        let mut playing = round(RoundPhase::Playing);
        playing.question_state = Some(QuestionState::Answering);

        assert!(!reveals_now(&playing, 1, 3));
        assert!(reveals_now(&playing, 2, 3));

        playing.question_state = Some(QuestionState::Revealed);
        assert!(!reveals_now(&playing, 3, 3));
    }
}
