// tests/router_tests.rs

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use exam_platform::{
    config::{Config, MAX_IMAGE_BYTES},
    models::user::Role,
    routes,
    state::AppState,
    store::MemoryStore,
    upload::UploadPipeline,
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "exam-platform-boundary";

fn app_without_image_host() -> Router {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Config::for_tests(),
        UploadPipeline::unconfigured(),
    );
    routes::create_router(state)
}

fn bearer(role: Role) -> String {
    let config = Config::for_tests();
    sign_jwt(1, role, &config.jwt_secret, 60).expect("sign token")
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body).expect("request")
}

fn multipart_request(uri: &str, token: &str, slot: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"slot\"\r\n\r\n{slot}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"img.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("multipart request")
}

async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Creates the sample draft and returns its id.
async fn sample_draft(app: &Router, token: &str) -> String {
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/admin/drafts/sample", Some(token), Body::empty()))
        .await
        .expect("sample");
    let sample = read_json(response).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/admin/drafts",
            Some(token),
            Body::from(sample.to_string()),
        ))
        .await
        .expect("create draft");
    assert_eq!(response.status(), StatusCode::CREATED);
    let draft = read_json(response).await;
    draft["id"].as_str().expect("draft id").to_string()
}

fn png_of_len(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    bytes[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    bytes
}

#[tokio::test]
async fn missing_or_forged_tokens_are_unauthorized() {
    let app = app_without_image_host();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/master/overview", None, Body::empty()))
        .await
        .expect("overview");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = sign_jwt(1, Role::Master, "some_other_secret", 60).expect("sign token");
    let response = app
        .oneshot(request(Method::GET, "/api/master/overview", Some(&forged), Body::empty()))
        .await
        .expect("overview");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_store_overview_has_no_averages() {
    let app = app_without_image_host();
    let token = bearer(Role::Master);

    let response = app
        .oneshot(request(Method::GET, "/api/master/overview", Some(&token), Body::empty()))
        .await
        .expect("overview");
    assert_eq!(response.status(), StatusCode::OK);

    let overview = read_json(response).await;
    assert_eq!(overview["submission_count"], 0);
    assert!(overview["average_percentage"].is_null());
    assert_eq!(overview["recent_results"], json!([]));
}

#[tokio::test]
async fn oversized_image_is_rejected_with_413() {
    let app = app_without_image_host();
    let token = bearer(Role::Admin);
    let draft = sample_draft(&app, &token).await;

    let response = app
        .oneshot(multipart_request(
            &format!("/api/admin/drafts/{draft}/images"),
            &token,
            "question:1",
            "image/png",
            &png_of_len(MAX_IMAGE_BYTES + 1),
        ))
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn upload_without_image_host_is_bad_gateway() {
    let app = app_without_image_host();
    let token = bearer(Role::Admin);
    let draft = sample_draft(&app, &token).await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            &format!("/api/admin/drafts/{draft}/images"),
            &token,
            "question:1",
            "image/png",
            &png_of_len(64),
        ))
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // The slot is still open afterwards.
    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/admin/drafts/{draft}"),
            Some(&token),
            Body::empty(),
        ))
        .await
        .expect("draft");
    let view = read_json(response).await;
    assert_eq!(view["missing_slots"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn unknown_slot_is_a_bad_request() {
    let app = app_without_image_host();
    let token = bearer(Role::Admin);
    let draft = sample_draft(&app, &token).await;

    let response = app
        .oneshot(multipart_request(
            &format!("/api/admin/drafts/{draft}/images"),
            &token,
            "option:2:C",
            "image/png",
            &png_of_len(64),
        ))
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
