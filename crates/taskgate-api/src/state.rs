//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AccessGate, IdentityOnboarding, PasswordError, SecretHasher, TokenIssuer, UserStore};
use crate::tasks::{TaskService, TaskStore};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskgate_core::{AppConfig, Clock};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Token verification for the authenticate middleware
    pub gate: AccessGate,
    /// Register / login / promote
    pub onboarding: Arc<IdentityOnboarding>,
    /// Task reads and writes
    pub tasks: Arc<TaskService>,
}

impl AppState {
    /// Wire the auth components from configuration
    ///
    /// Fails only when the configured Argon2 work factor is unusable.
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PasswordError> {
        let hasher = SecretHasher::new(&config.auth.password)?;
        Ok(Self::with_hasher(config, users, tasks, clock, hasher))
    }

    /// Like [`AppState::new`] with an explicit hasher
    pub fn with_hasher(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        hasher: SecretHasher,
    ) -> Self {
        let store_timeout = Duration::from_secs(config.database.store_timeout_secs);
        let issuer = Arc::new(TokenIssuer::from_config(&config.auth, clock.clone()));
        let onboarding = Arc::new(IdentityOnboarding::new(
            users,
            hasher,
            issuer.clone(),
            clock.clone(),
            store_timeout,
        ));
        let tasks = Arc::new(TaskService::new(tasks, clock, store_timeout));

        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            gate: AccessGate::new(issuer),
            onboarding,
            tasks,
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status; cleared while the server drains on shutdown
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
