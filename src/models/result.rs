// src/models/result.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// Question id to chosen option key. Unanswered questions have no entry.
pub type AnswerSheet = BTreeMap<i64, String>;

/// Represents the 'results' table in the database.
/// One row per submitted attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub score: i64,

    /// Copied from the test when the attempt was submitted.
    pub total_marks: i64,

    pub answers: Json<AnswerSheet>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl TestResult {
    /// Score as a percentage, `None` for a test worth zero marks.
    pub fn percentage(&self) -> Option<f64> {
        percentage(self.score, self.total_marks)
    }
}

/// Insert payload for a result.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub user_id: i64,
    pub test_id: i64,
    pub score: i64,
    pub total_marks: i64,
    pub answers: AnswerSheet,
}

pub fn percentage(score: i64, total_marks: i64) -> Option<f64> {
    if total_marks == 0 {
        return None;
    }
    Some(score as f64 / total_marks as f64 * 100.0)
}
