//! taskgate API - authentication and role-based access control over HTTP
//!
//! Provides registration, login, token-gated identity and task endpoints,
//! and the middleware that enforces them.

pub mod audit;
pub mod auth;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod tasks;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use handlers::health;
use state::AppState;
use std::sync::Arc;
use taskgate_core::ServerConfig;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server);

    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", routes::api_routes(&state))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

/// Fixtures for integration tests
#[cfg(feature = "test-utils")]
pub mod testing {
    use crate::auth::{InMemoryUserStore, SecretHasher};
    use crate::state::AppState;
    use crate::tasks::InMemoryTaskStore;
    use std::sync::Arc;
    use taskgate_core::{AppConfig, SystemClock};

    pub const TEST_JWT_SECRET: &str = "taskgate-integration-test-secret";

    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
        config
    }

    /// Fresh state over empty in-memory stores with a low-cost hasher
    pub fn test_state() -> Arc<AppState> {
        Arc::new(AppState::with_hasher(
            test_config(),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(SystemClock),
            SecretHasher::for_testing(),
        ))
    }
}

/// Router over [`testing::test_state`]
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(testing::test_state())
}
