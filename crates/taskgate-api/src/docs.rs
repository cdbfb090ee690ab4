//! OpenAPI document
//!
//! Author: hephaex@gmail.com

use crate::auth::{IdentityPublic, LoginRequest, PromoteRequest, RegisterRequest, Role};
use crate::error::ApiError;
use crate::handlers::{auth, health, tasks, users};
use crate::tasks::{Task, TaskRequest, TaskStatus};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness_check,
        health::metrics,
        auth::register_handler,
        auth::login_handler,
        users::me_handler,
        users::list_users_handler,
        users::promote_handler,
        tasks::list_tasks_handler,
        tasks::get_task_handler,
        tasks::create_task_handler,
        tasks::update_task_handler,
        tasks::delete_task_handler
    ),
    components(
        schemas(
            ApiError,
            Role,
            IdentityPublic,
            RegisterRequest,
            LoginRequest,
            PromoteRequest,
            auth::RegisterResponse,
            auth::LoginResponse,
            users::IdentityListResponse,
            Task,
            TaskStatus,
            TaskRequest,
            tasks::TaskListResponse,
            health::HealthResponse,
            health::ReadinessResponse,
            health::ReadinessChecks,
            health::MetricsResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "health", description = "Liveness, readiness and counters"),
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "Identity management"),
        (name = "tasks", description = "Tasks: read by any identity, written by privileged ones")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes_and_security() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();

        for path in [
            "/health",
            "/api/v1/auth/register",
            "/api/v1/auth/login",
            "/api/v1/users/me",
            "/api/v1/users",
            "/api/v1/users/promote",
            "/api/v1/tasks",
            "/api/v1/tasks/{id}",
        ] {
            assert!(doc["paths"][path].is_object(), "missing {path}");
        }
        assert_eq!(
            doc["components"]["securitySchemes"]["bearer_auth"]["scheme"],
            "bearer"
        );
    }
}
