// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::MAX_IMAGE_BYTES,
    handlers::{admin, auth, catalog, master, session},
    models::user::Role,
    state::AppState,
    utils::jwt::{auth_middleware, role_middleware},
};

const STUDENT: &[Role] = &[Role::Student];
const ADMIN: &[Role] = &[Role::Admin];
const MASTER: &[Role] = &[Role::Master];

/// Room for multipart framing around a maximum-size image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Assembles the main application router.
///
/// * Public: signup and login.
/// * Any signed-in role: `me`, logout, the test catalogue.
/// * Role-gated: sessions and own results (student), drafts (admin),
///   analytics (master).
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .route("/logout", post(auth::logout))
                .layer(require_auth.clone()),
        );

    let catalog_routes = Router::new()
        .route("/", get(catalog::list_tests))
        .route("/{id}", get(catalog::get_test))
        .layer(require_auth.clone());

    let session_routes = Router::new()
        .route("/", post(session::start_session))
        .route(
            "/{id}",
            get(session::get_session).delete(session::abandon_session),
        )
        .route("/{id}/answers", put(session::select_answer))
        .route("/{id}/navigate", post(session::navigate))
        .route("/{id}/confirm", get(session::confirm_submit))
        .route("/{id}/submit", post(session::submit_session))
        .layer(middleware::from_fn_with_state(STUDENT, role_middleware))
        .layer(require_auth.clone());

    let result_routes = Router::new()
        .route("/me", get(session::my_results))
        .layer(middleware::from_fn_with_state(STUDENT, role_middleware))
        .layer(require_auth.clone());

    let admin_routes = Router::new()
        .route("/tests", get(admin::list_tests))
        .route("/drafts", post(admin::create_draft))
        .route("/drafts/sample", get(admin::sample_draft))
        .route(
            "/drafts/{id}",
            get(admin::get_draft).delete(admin::discard_draft),
        )
        .route(
            "/drafts/{id}/images",
            post(admin::upload_image)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/drafts/{id}/publish", post(admin::publish_draft))
        // Double middleware protection: Auth first, then role check
        .layer(middleware::from_fn_with_state(ADMIN, role_middleware))
        .layer(require_auth.clone());

    let master_routes = Router::new()
        .route("/overview", get(master::overview))
        .route("/users", get(master::list_users))
        .route("/tests", get(master::list_tests))
        .route("/results", get(master::list_results))
        .route("/export", get(master::export))
        .layer(middleware::from_fn_with_state(MASTER, role_middleware))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/tests", catalog_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/results", result_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/master", master_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
