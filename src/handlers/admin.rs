// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    authoring::{Slot, sample_document},
    error::AppError,
    state::AppState,
    upload::ImageUpload,
    utils::jwt::Claims,
};

/// Lists all tests with their answer keys.
/// Admin only.
pub async fn list_tests(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.get_all_tests().await?))
}

/// Parses a pasted test document into a draft.
///
/// The body is the raw document text, so malformed JSON comes back as a
/// readable 400 rather than an extractor rejection.
/// Admin only.
pub async fn create_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("Paste a test document first".to_string()));
    }
    let view = state.drafts.create(claims.user_id()?, &body)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Example document for authors to start from.
pub async fn sample_draft() -> impl IntoResponse {
    Json(sample_document())
}

pub async fn get_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.drafts.get(id, claims.user_id()?)?))
}

pub async fn discard_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.drafts.discard(id, claims.user_id()?)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Uploads one image into a draft slot.
///
/// Multipart fields: `slot` (`question:<id>` or `option:<id>:<key>`) and
/// `file`.
/// Admin only.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut slot: Option<Slot> = None;
    let mut file: Option<ImageUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("slot") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                slot = Some(text.trim().parse::<Slot>()?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let slot = slot.ok_or_else(|| AppError::BadRequest("Missing 'slot' field".to_string()))?;
    let file = file.ok_or_else(|| AppError::BadRequest("No file selected".to_string()))?;

    let view = state
        .drafts
        .attach_image(id, claims.user_id()?, slot, file, &state.uploads)
        .await?;
    Ok(Json(view))
}

/// Publishes a draft once every image is in place.
/// Admin only.
pub async fn publish_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let test = state
        .drafts
        .publish(id, claims.user_id()?, state.store.as_ref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": test.id,
            "message": format!("Test published! ID: {}", test.id),
        })),
    ))
}
