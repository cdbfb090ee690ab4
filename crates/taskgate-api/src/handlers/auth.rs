//! Authentication API handlers
//!
//! Public endpoints for registration and login.
//!
//! Author: hephaex@gmail.com

use crate::auth::{IdentityPublic, LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Registration response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user: IdentityPublic,
    pub message: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: IdentityPublic,
}

/// Register a new identity
///
/// The first identity registered on an empty store becomes privileged;
/// every later one starts as standard.
///
/// # Responses
///
/// * `201 Created` - Identity registered
/// * `400 Bad Request` - Invalid input
/// * `409 Conflict` - Username already exists
/// * `503 Service Unavailable` - Identity store unavailable
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Identity registered", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Username already exists", body = crate::error::ApiError),
        (status = 503, description = "Identity store unavailable", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let identity = state
        .onboarding
        .register(&request.username, &request.password)
        .await?;

    let response = RegisterResponse {
        user: identity.to_public(),
        message: "Registration successful".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with username and password
///
/// # Responses
///
/// * `200 OK` - Returns a bearer token
/// * `401 Unauthorized` - Invalid credentials (unknown user or wrong password)
/// * `503 Service Unavailable` - Identity store unavailable
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 503, description = "Identity store unavailable", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let outcome = state
        .onboarding
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        token_type: "Bearer".to_string(),
        expires_in: state.onboarding.issuer().lifetime().num_seconds(),
        user: outcome.identity.to_public(),
    }))
}
