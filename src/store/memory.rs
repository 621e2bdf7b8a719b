// src/store/memory.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    result::{NewResult, TestResult},
    test::{NewTest, Test},
    user::{NewUser, User},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tests: Vec<Test>,
    results: Vec<TestResult>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store. Used when no database is configured, and by tests.
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T: Clone>(rows: &[T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, i64)) -> Vec<T> {
    let mut out = rows.to_vec();
    out.sort_by(|a, b| key(b).cmp(&key(a)));
    out
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("User '{}'", user.email)));
        }

        let row = User {
            id: tables.next_id(),
            email: user.email,
            name: user.name,
            role: user.role,
            phone: user.phone,
            password: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.push(row.clone());
        tracing::info!("User created: {}", row.id);
        Ok(row)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_all_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.users, |u| (u.created_at, u.id)))
    }

    async fn create_test(&self, test: NewTest) -> StoreResult<Test> {
        let mut tables = self.tables.write().await;
        let row = Test {
            id: tables.next_id(),
            title: test.title,
            duration: test.duration,
            questions: Json(test.questions),
            created_by: test.created_by,
            created_at: Utc::now(),
        };
        tables.tests.push(row.clone());
        tracing::info!("Test created: {}", row.id);
        Ok(row)
    }

    async fn get_all_tests(&self) -> StoreResult<Vec<Test>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.tests, |t| (t.created_at, t.id)))
    }

    async fn get_test_by_id(&self, id: i64) -> StoreResult<Option<Test>> {
        let tables = self.tables.read().await;
        Ok(tables.tests.iter().find(|t| t.id == id).cloned())
    }

    async fn submit_result(&self, result: NewResult) -> StoreResult<TestResult> {
        let mut tables = self.tables.write().await;
        let row = TestResult {
            id: tables.next_id(),
            user_id: result.user_id,
            test_id: result.test_id,
            score: result.score,
            total_marks: result.total_marks,
            answers: Json(result.answers),
            submitted_at: Utc::now(),
        };
        tables.results.push(row.clone());
        tracing::info!("Result submitted: {}", row.id);
        Ok(row)
    }

    async fn get_user_results(&self, user_id: i64) -> StoreResult<Vec<TestResult>> {
        let tables = self.tables.read().await;
        let mine: Vec<TestResult> = tables
            .results
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&mine, |r| (r.submitted_at, r.id)))
    }

    async fn get_all_results(&self) -> StoreResult<Vec<TestResult>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.results, |r| (r.submitted_at, r.id)))
    }
}
