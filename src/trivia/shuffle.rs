use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use uuid::Uuid;

use crate::store::Question;

const LABELS: [&str; 4] = ["A", "B", "C", "D"];

/// An answer option with its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledOption {
    pub label: &'static str,
    pub value: String,
}

/// The question's four options in a stable per-question order, labeled A-D.
pub fn shuffled_options(question: &Question) -> Vec<LabeledOption> {
    let [wrong_1, wrong_2, wrong_3] = question.wrong_answers.clone();
    let options = [question.correct_answer.clone(), wrong_1, wrong_2, wrong_3];

    permutation(question.id)
        .into_iter()
        .zip(LABELS)
        .map(|(index, label)| LabeledOption {
            label,
            value: options[index].clone(),
        })
        .collect()
}

/// Fisher-Yates over option indices, seeded from the first 8 bytes of the id.
/// Depends on nothing but the id, so every viewer sees the same order.
pub fn permutation(question_id: Uuid) -> [usize; 4] {
    let (seed, _) = question_id.as_u64_pair();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut order = [0, 1, 2, 3];
    for i in (1..order.len()).rev() {
        let j = rng.random_range(0..=i);
        order.swap(i, j);
    }
    order
}
