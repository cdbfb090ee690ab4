//! Task handlers
//!
//! Reads are open to every authenticated identity; writes require the
//! privileged role. Both rules are enforced by the route layers.
//!
//! Author: hephaex@gmail.com

use crate::auth::IdentityContext;
use crate::error::AppError;
use crate::state::AppState;
use crate::tasks::{Task, TaskRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Task listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
}

/// List all tasks
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    tag = "tasks",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All tasks", body = TaskListResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    )
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let tasks = state.tasks.list_tasks().await?;
    Ok(Json(TaskListResponse {
        total: tasks.len(),
        tasks,
    }))
}

/// Get a task by id
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "No such task", body = crate::error::ApiError),
    )
)]
pub async fn get_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.tasks.get_task(id).await?))
}

/// Create a task (privileged only)
#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    tag = "tasks",
    security(("bearer_auth" = [])),
    request_body = TaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Privileged role required", body = crate::error::ApiError),
    )
)]
pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<IdentityContext>,
    Json(request): Json<TaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let task = state.tasks.create_task(request).await?;
    tracing::debug!(task_id = %task.id, actor = %actor.user_id, "Task created via API");

    Ok((StatusCode::CREATED, Json(task)))
}

/// Replace a task (privileged only)
#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = TaskRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Privileged role required", body = crate::error::ApiError),
        (status = 404, description = "No such task", body = crate::error::ApiError),
    )
)]
pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<TaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let task = state.tasks.update_task(id, request).await?;
    tracing::debug!(task_id = %task.id, actor = %actor.user_id, "Task updated via API");

    Ok(Json(task))
}

/// Delete a task (privileged only)
#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Privileged role required", body = crate::error::ApiError),
        (status = 404, description = "No such task", body = crate::error::ApiError),
    )
)]
pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.tasks.delete_task(id).await?;
    tracing::debug!(task_id = %id, actor = %actor.user_id, "Task deleted via API");

    Ok(StatusCode::NO_CONTENT)
}
