// src/session/scoring.rs

use serde::Serialize;

use crate::models::{
    result::{AnswerSheet, percentage},
    test::Question,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub score: i64,
    pub total_marks: i64,
}

impl Score {
    pub fn percentage(&self) -> Option<f64> {
        percentage(self.score, self.total_marks)
    }
}

/// Scores an answer sheet against every question of a test.
///
/// Every question adds its marks to the total; only an answer equal to the
/// correct key adds them to the score. No partial credit, no penalty.
pub fn score(questions: &[Question], answers: &AnswerSheet) -> Score {
    questions.iter().fold(
        Score {
            score: 0,
            total_marks: 0,
        },
        |mut acc, q| {
            acc.total_marks += q.marks;
            if answers.get(&q.id) == Some(&q.correct_answer) {
                acc.score += q.marks;
            }
            acc
        },
    )
}
