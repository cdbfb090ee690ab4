//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::{authenticate, require_authenticated, require_role};
use crate::auth::Role;
use crate::handlers::{auth, tasks, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Roles admitted to self-service endpoints and task reads
const ANY_ROLE: &[Role] = &[Role::Standard, Role::Privileged];

/// Roles admitted to identity administration and task writes
const PRIVILEGED_ONLY: &[Role] = &[Role::Privileged];

/// Create API v1 routes
pub fn api_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler));

    // Any authenticated identity
    let read_routes = Router::new()
        .route("/users/me", get(users::me_handler))
        .route("/tasks", get(tasks::list_tasks_handler))
        .route("/tasks/:id", get(tasks::get_task_handler))
        .route_layer(middleware::from_fn(require_role(ANY_ROLE)));

    // Privileged identities only; same paths as the task reads, other methods
    let admin_routes = Router::new()
        .route("/users", get(users::list_users_handler))
        .route("/users/promote", post(users::promote_handler))
        .route("/tasks", post(tasks::create_task_handler))
        .route(
            "/tasks/:id",
            put(tasks::update_task_handler).delete(tasks::delete_task_handler),
        )
        .route_layer(middleware::from_fn(require_role(PRIVILEGED_ONLY)));

    // authenticate -> require_authenticated -> require_role
    let protected_routes = Router::new()
        .merge(read_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn(require_authenticated))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            authenticate,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}
