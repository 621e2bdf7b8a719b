// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    session::{Navigation, SessionRegistry, SubmitOutcome},
    store::Store,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub test_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub question_id: i64,
    pub option: String,
}

/// Loads a test and starts the clock on a new attempt.
pub async fn start_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.start(req.test_id, claims.user_id()?).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(sessions.view(id, claims.user_id()?).await?))
}

/// Records or replaces the answer to one question.
pub async fn select_answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .select(id, claims.user_id()?, req.question_id, &req.option)
        .await?;
    Ok(Json(view))
}

pub async fn navigate(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(nav): Json<Navigation>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(sessions.navigate(id, claims.user_id()?, nav).await?))
}

/// Answered / unanswered counts shown before a manual submit.
pub async fn confirm_submit(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(sessions.confirmation(id, claims.user_id()?).await?))
}

/// Scores and stores the attempt.
///
/// A submit that arrives while another is in flight is acknowledged with
/// 202 and otherwise ignored.
pub async fn submit_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    match sessions.submit(id, claims.user_id()?).await? {
        SubmitOutcome::Submitted(receipt) => {
            let message = match receipt.percentage {
                Some(p) => format!(
                    "Test submitted! Your Score: {}/{} ({:.1}%)",
                    receipt.score, receipt.total_marks, p
                ),
                None => format!("Test submitted! Your Score: {}/{}", receipt.score, receipt.total_marks),
            };
            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "submitted",
                    "result": receipt,
                    "message": message,
                })),
            ))
        }
        SubmitOutcome::Ignored => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "ignored",
                "message": "A submission is already in progress",
            })),
        )),
    }
}

/// Leaves the session. Nothing is recorded.
pub async fn abandon_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sessions.abandon(id, claims.user_id()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own results, newest first.
pub async fn my_results(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let results = store.get_user_results(claims.user_id()?).await?;
    Ok(Json(results))
}
