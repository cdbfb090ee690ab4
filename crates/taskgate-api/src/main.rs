//! taskgate API Server
//!
//! REST API server for registration, login, and role-gated identity and task
//! endpoints.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use taskgate_api::{
    auth::{repository::connect_pool, InMemoryUserStore, PgUserStore, UserStore},
    create_router,
    state::AppState,
    tasks::{InMemoryTaskStore, PgTaskStore, TaskStore},
};
use taskgate_core::{AppConfig, LoggingConfig, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load().context("loading configuration")?;

    // Initialize tracing
    init_tracing(&config.logging);

    config.validate().context("validating configuration")?;
    if config.uses_development_secret() {
        tracing::warn!("JWT_SECRET is not set; using the built-in development secret");
    }

    let (users, tasks) = open_stores(&config).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(
        AppState::new(config, users, tasks, Arc::new(SystemClock))
            .context("configuring password hashing")?,
    );

    // Create router
    let app = create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("taskgate API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("taskgate API Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{},taskgate_api=debug,tower_http=debug",
            logging.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

type Stores = (Arc<dyn UserStore>, Arc<dyn TaskStore>);

async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.database.postgres_url {
        Some(url) => {
            let pool = connect_pool(
                url,
                config.database.postgres_pool_size,
                Duration::from_secs(config.database.store_timeout_secs),
            )
            .await
            .context("connecting to PostgreSQL")?;

            let users = PgUserStore::new(pool.clone());
            users.migrate().await.context("migrating identities table")?;
            let tasks = PgTaskStore::new(pool);
            tasks.migrate().await.context("migrating tasks table")?;

            tracing::info!("Using PostgreSQL identity and task stores");
            Ok((Arc::new(users), Arc::new(tasks)))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; identities and tasks are kept in memory");
            Ok((
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemoryTaskStore::new()),
            ))
        }
    }
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    // Report not-ready while in-flight requests drain
    state.set_ready(false);
    tracing::info!("Shutdown signal received");
}
