// src/handlers/catalog.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::test::{PublicTest, TestSummary},
    store::Store,
};

/// Lists every published test, newest first, without questions.
pub async fn list_tests(State(store): State<Arc<dyn Store>>) -> Result<impl IntoResponse, AppError> {
    let tests = store.get_all_tests().await?;
    let summaries: Vec<TestSummary> = tests.iter().map(TestSummary::from).collect();
    Ok(Json(summaries))
}

/// One test as a student sees it: no answer key, no solutions.
pub async fn get_test(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = store
        .get_test_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

    Ok(Json(PublicTest::from(&test)))
}
