// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{AuthResponse, LoginRequest, NewUser, SignupRequest, User, normalize_email},
    state::AppState,
    store::{Store, StoreError},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

fn authenticated(user: User, config: &Config) -> Result<AuthResponse, AppError> {
    let token = sign_jwt(user.id, user.role, &config.jwt_secret, config.jwt_expiration)?;
    Ok(AuthResponse {
        token: Some(token),
        token_type: "Bearer",
        home: user.role.home_path(),
        user,
    })
}

/// Registers a new user and signs them in straight away.
///
/// Fails with 409 when the email is already taken; no second record is made.
pub async fn signup(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = normalize_email(&payload.email);
    if store.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User already exists. Please login.".to_string()));
    }

    let user = store
        .create_user(NewUser {
            email,
            name: payload.name.trim().to_string(),
            role: payload.role,
            phone: payload.phone.filter(|p| !p.trim().is_empty()),
            password_hash: hash_password(&payload.password)?,
        })
        .await
        .map_err(|e| match e {
            // Lost a race with another signup for the same email.
            StoreError::Duplicate(_) => {
                AppError::Conflict("User already exists. Please login.".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!("Signup successful: {} ({})", user.id, user.role);
    Ok((StatusCode::CREATED, Json(authenticated(user, &config)?)))
}

/// Authenticates a user and returns a JWT token.
///
/// Looks the user up by email and verifies the password against the stored
/// Argon2 hash.
pub async fn login(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = store
        .get_user_by_email(&normalize_email(&payload.email))
        .await?
        .ok_or_else(|| AppError::AuthError("User not found. Please sign up first.".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    tracing::info!("Login successful: {} ({})", user.id, user.role);
    Ok(Json(authenticated(user, &config)?))
}

/// Restores the principal behind a token.
pub async fn me(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .get_user_by_id(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;

    Ok(Json(AuthResponse {
        token: None,
        token_type: "Bearer",
        home: user.role.home_path(),
        user,
    }))
}

/// Revokes the presented token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    state.revoked.revoke(&claims);
    tracing::info!("Logged out: {}", claims.sub);
    StatusCode::NO_CONTENT
}
