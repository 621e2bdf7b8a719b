// src/analytics.rs

//! Aggregate figures for the master dashboard, and the full data export.

use serde::{Deserialize, Serialize};

use crate::{
    config::{PASSING_RATIO, RECENT_ACTIVITY_LIMIT},
    models::{
        result::TestResult,
        test::Test,
        user::{Role, User},
    },
};

#[derive(Debug, Serialize)]
pub struct Overview {
    pub student_count: usize,
    pub admin_count: usize,
    pub master_count: usize,
    pub user_count: usize,
    pub test_count: usize,
    pub submission_count: usize,
    /// Mean percentage over results worth more than zero marks, one decimal.
    pub average_percentage: Option<f64>,
    /// Share of those results at or above the pass ratio, whole percent.
    pub success_rate: Option<f64>,
    pub recent_results: Vec<TestResult>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl Overview {
    /// `results` is expected newest first, as the store returns it.
    pub fn compute(users: &[User], tests: &[Test], results: &[TestResult]) -> Self {
        let count_role = |role: Role| users.iter().filter(|u| u.role == role).count();

        let percentages: Vec<f64> = results.iter().filter_map(TestResult::percentage).collect();

        let (average_percentage, success_rate) = if percentages.is_empty() {
            (None, None)
        } else {
            let n = percentages.len() as f64;
            let mean = percentages.iter().sum::<f64>() / n;
            let passed = percentages
                .iter()
                .filter(|p| **p >= PASSING_RATIO * 100.0)
                .count() as f64;
            (Some(round_to(mean, 1)), Some(round_to(passed / n * 100.0, 0)))
        };

        Self {
            student_count: count_role(Role::Student),
            admin_count: count_role(Role::Admin),
            master_count: count_role(Role::Master),
            user_count: users.len(),
            test_count: tests.len(),
            submission_count: results.len(),
            average_percentage,
            success_rate,
            recent_results: results.iter().take(RECENT_ACTIVITY_LIMIT).cloned().collect(),
        }
    }
}

/// Everything the platform holds, as one JSON document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tests: Vec<Test>,
    pub users: Vec<User>,
    pub results: Vec<TestResult>,
    pub exported_at: chrono::DateTime<chrono::Utc>,
}

impl Snapshot {
    pub fn new(tests: Vec<Test>, users: Vec<User>, results: Vec<TestResult>) -> Self {
        Self {
            tests,
            users,
            results,
            exported_at: chrono::Utc::now(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("test-platform-export-{}.json", self.exported_at.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use sqlx::types::Json;

    use super::*;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            email: format!("u{}@example.com", id),
            name: format!("User {}", id),
            role,
            phone: None,
            password: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    fn result(id: i64, score: i64, total_marks: i64) -> TestResult {
        TestResult {
            id,
            user_id: 1,
            test_id: 1,
            score,
            total_marks,
            answers: Json(BTreeMap::new()),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn counts_roles_and_averages_scores() {
        let users = vec![
            user(1, Role::Student),
            user(2, Role::Student),
            user(3, Role::Admin),
            user(4, Role::Master),
        ];
        let results = vec![result(1, 4, 8), result(2, 1, 10), result(3, 10, 10)];

        let overview = Overview::compute(&users, &[], &results);
        assert_eq!(overview.student_count, 2);
        assert_eq!(overview.admin_count, 1);
        assert_eq!(overview.master_count, 1);
        assert_eq!(overview.submission_count, 3);
        // (50 + 10 + 100) / 3
        assert_eq!(overview.average_percentage, Some(53.3));
        // 50% and 100% pass, 10% does not
        assert_eq!(overview.success_rate, Some(67.0));
    }

    #[test]
    fn no_results_means_no_averages() {
        let overview = Overview::compute(&[], &[], &[]);
        assert_eq!(overview.average_percentage, None);
        assert_eq!(overview.success_rate, None);
        assert!(overview.recent_results.is_empty());
    }

    #[test]
    fn recent_activity_is_capped() {
        let results: Vec<_> = (1..=8).map(|i| result(i, 1, 2)).collect();
        let overview = Overview::compute(&[], &[], &results);
        assert_eq!(overview.recent_results.len(), RECENT_ACTIVITY_LIMIT);
        assert_eq!(overview.recent_results[0].id, 1);
    }

    #[test]
    fn snapshot_round_trip_keeps_counts() {
        let snapshot = Snapshot::new(
            Vec::new(),
            vec![user(1, Role::Student), user(2, Role::Admin)],
            vec![result(1, 4, 8)],
        );
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"exportedAt\""));

        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tests.len(), 0);
        assert_eq!(parsed.users.len(), 2);
        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.users.iter().all(|u| u.password.is_empty()));
    }
}
