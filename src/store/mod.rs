// src/store/mod.rs

//! Persistence gateway.
//!
//! Every read and write of users, tests and results goes through [`Store`].
//! No business rules live here; list operations return newest first.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        result::{NewResult, TestResult},
        test::{NewTest, Test},
        user::{NewUser, User},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (duplicate email).
    #[error("{0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::Conflict(format!("{} already exists", what)),
            StoreError::Database(e) => {
                tracing::error!("Store failure: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// `None` when no user has this email.
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn get_user_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    async fn get_all_users(&self) -> StoreResult<Vec<User>>;

    async fn create_test(&self, test: NewTest) -> StoreResult<Test>;

    async fn get_all_tests(&self) -> StoreResult<Vec<Test>>;

    async fn get_test_by_id(&self, id: i64) -> StoreResult<Option<Test>>;

    async fn submit_result(&self, result: NewResult) -> StoreResult<TestResult>;

    async fn get_user_results(&self, user_id: i64) -> StoreResult<Vec<TestResult>>;

    async fn get_all_results(&self) -> StoreResult<Vec<TestResult>>;
}
