// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use super::{Store, StoreError, StoreResult};
use crate::models::{
    result::{NewResult, TestResult},
    test::{NewTest, Test},
    user::{NewUser, User},
};

const USER_COLUMNS: &str = "id, email, name, role, phone, password, created_at";
const TEST_COLUMNS: &str = "id, title, duration, questions, created_by, created_at";
const RESULT_COLUMNS: &str = "id, user_id, test_id, score, total_marks, answers, submitted_at";

/// PostgreSQL-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (email, name, role, phone, password) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );

        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(&user.phone)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await;

        match created {
            Ok(row) => {
                tracing::info!("User created: {}", row.id);
                Ok(row)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(format!("User '{}'", user.email)))
            }
            Err(e) => {
                tracing::error!("Failed to create user: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_all_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list users: {:?}", e);
                e
            })?;
        Ok(users)
    }

    async fn create_test(&self, test: NewTest) -> StoreResult<Test> {
        let sql = format!(
            "INSERT INTO tests (title, duration, questions, created_by) \
             VALUES ($1, $2, $3::json, $4) RETURNING {}",
            TEST_COLUMNS
        );

        // Bound as text so the server never reorders option keys.
        let questions = serde_json::to_string(&test.questions)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let created = sqlx::query_as::<_, Test>(&sql)
            .bind(&test.title)
            .bind(test.duration)
            .bind(questions)
            .bind(test.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create test: {:?}", e);
                e
            })?;

        tracing::info!("Test created: {}", created.id);
        Ok(created)
    }

    async fn get_all_tests(&self) -> StoreResult<Vec<Test>> {
        let sql = format!(
            "SELECT {} FROM tests ORDER BY created_at DESC, id DESC",
            TEST_COLUMNS
        );
        let tests = sqlx::query_as::<_, Test>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list tests: {:?}", e);
                e
            })?;
        Ok(tests)
    }

    async fn get_test_by_id(&self, id: i64) -> StoreResult<Option<Test>> {
        let sql = format!("SELECT {} FROM tests WHERE id = $1", TEST_COLUMNS);
        let test = sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch test {}: {:?}", id, e);
                e
            })?;
        Ok(test)
    }

    async fn submit_result(&self, result: NewResult) -> StoreResult<TestResult> {
        let sql = format!(
            "INSERT INTO results (user_id, test_id, score, total_marks, answers) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            RESULT_COLUMNS
        );

        let created = sqlx::query_as::<_, TestResult>(&sql)
            .bind(result.user_id)
            .bind(result.test_id)
            .bind(result.score)
            .bind(result.total_marks)
            .bind(Json(result.answers))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert result: {:?}", e);
                e
            })?;

        tracing::info!("Result submitted: {}", created.id);
        Ok(created)
    }

    async fn get_user_results(&self, user_id: i64) -> StoreResult<Vec<TestResult>> {
        let sql = format!(
            "SELECT {} FROM results WHERE user_id = $1 ORDER BY submitted_at DESC, id DESC",
            RESULT_COLUMNS
        );
        let results = sqlx::query_as::<_, TestResult>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(results)
    }

    async fn get_all_results(&self) -> StoreResult<Vec<TestResult>> {
        let sql = format!(
            "SELECT {} FROM results ORDER BY submitted_at DESC, id DESC",
            RESULT_COLUMNS
        );
        let results = sqlx::query_as::<_, TestResult>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list results: {:?}", e);
                e
            })?;
        Ok(results)
    }
}
