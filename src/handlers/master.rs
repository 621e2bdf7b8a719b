// src/handlers/master.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::{
    analytics::{Overview, Snapshot},
    error::AppError,
    store::Store,
};

/// Aggregate counts, averages and the latest submissions.
/// Master only.
pub async fn overview(State(store): State<Arc<dyn Store>>) -> Result<impl IntoResponse, AppError> {
    let (tests, users, results) = tokio::try_join!(
        store.get_all_tests(),
        store.get_all_users(),
        store.get_all_results(),
    )?;

    Ok(Json(Overview::compute(&users, &tests, &results)))
}

pub async fn list_users(State(store): State<Arc<dyn Store>>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.get_all_users().await?))
}

pub async fn list_tests(State(store): State<Arc<dyn Store>>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.get_all_tests().await?))
}

pub async fn list_results(State(store): State<Arc<dyn Store>>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.get_all_results().await?))
}

/// Downloads every test, user and result as one JSON file.
/// Master only.
pub async fn export(State(store): State<Arc<dyn Store>>) -> Result<impl IntoResponse, AppError> {
    let (tests, users, results) = tokio::try_join!(
        store.get_all_tests(),
        store.get_all_users(),
        store.get_all_results(),
    )?;

    let snapshot = Snapshot::new(tests, users, results);
    let disposition = format!("attachment; filename=\"{}\"", snapshot.file_name());
    tracing::info!(
        tests = snapshot.tests.len(),
        users = snapshot.users.len(),
        results = snapshot.results.len(),
        "Data exported"
    );

    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(snapshot),
    ))
}
