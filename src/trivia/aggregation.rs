use serde::Serialize;

use super::shuffle::shuffled_options;
use crate::store::{AnswerStat, Question};

/// Number of answers after which a question counts as fully answered.
/// The author never answers their own question.
pub fn reveal_threshold(participant_count: usize) -> usize {
    participant_count.saturating_sub(1)
}

pub fn is_complete(answer_count: usize, participant_count: usize) -> bool {
    answer_count >= reveal_threshold(participant_count)
}

/// Exact, case-sensitive match against the author's correct answer
pub fn is_correct(question: &Question, selected_answer: &str) -> bool {
    question.correct_answer == selected_answer
}

/// `round(count / total * 100)`, zero when nobody answered
pub fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

/// One offered option with how many players picked it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionResult {
    pub label: &'static str,
    pub value: String,
    pub count: usize,
    pub percentage: u32,
    /// Only filled in once the viewer is allowed to see the answer
    pub is_correct: Option<bool>,
}

/// Re-indexes a distribution against the question's offered options, in
/// display order. Options nobody picked show up with a zero count; answers
/// that match no offered option are dropped.
pub fn option_results(
    question: &Question,
    distribution: &[AnswerStat],
    show_correct: bool,
) -> Vec<OptionResult> {
    let total: usize = distribution.iter().map(|stat| stat.count).sum();

    shuffled_options(question)
        .into_iter()
        .map(|option| {
            let count = distribution
                .iter()
                .filter(|stat| stat.answer == option.value)
                .map(|stat| stat.count)
                .sum();
            let is_correct = show_correct.then(|| is_correct(question, &option.value));
            OptionResult {
                label: option.label,
                percentage: percentage(count, total),
                value: option.value,
                count,
                is_correct,
            }
        })
        .collect()
}
