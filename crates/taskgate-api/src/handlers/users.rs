//! Identity management handlers
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditEvent};
use crate::auth::{IdentityContext, IdentityPublic, PromoteRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Identity listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IdentityListResponse {
    pub users: Vec<IdentityPublic>,
    pub total: usize,
}

/// Current identity
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current identity", body = IdentityPublic),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "Identity no longer exists", body = crate::error::ApiError),
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<IdentityContext>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.onboarding.get_identity(context.user_id).await?;
    Ok(Json(identity.to_public()))
}

/// List all identities (privileged only)
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All identities", body = IdentityListResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Privileged role required", body = crate::error::ApiError),
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let users: Vec<IdentityPublic> = state
        .onboarding
        .list_identities()
        .await?
        .iter()
        .map(|identity| identity.to_public())
        .collect();

    Ok(Json(IdentityListResponse {
        total: users.len(),
        users,
    }))
}

/// Promote an identity to privileged (privileged only)
#[utoipa::path(
    post,
    path = "/api/v1/users/promote",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = PromoteRequest,
    responses(
        (status = 200, description = "Identity promoted", body = IdentityPublic),
        (status = 403, description = "Privileged role required", body = crate::error::ApiError),
        (status = 404, description = "No such identity", body = crate::error::ApiError),
        (status = 409, description = "Identity is already privileged", body = crate::error::ApiError),
    )
)]
pub async fn promote_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<IdentityContext>,
    Json(request): Json<PromoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let identity = state.onboarding.promote(&request.username).await?;

    audit_log(&AuditEvent::RolePromoted {
        user_id: identity.id,
        username: identity.username.clone(),
        promoted_by: actor.user_id,
    });

    Ok(Json(identity.to_public()))
}
