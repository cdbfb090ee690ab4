//! taskgate core - configuration and shared primitives
//!
//! This crate holds what every taskgate binary needs regardless of transport:
//! - Configuration management (environment, TOML files, validation)
//! - The [`Clock`] abstraction used for token timestamps

pub mod clock;
pub mod config;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordHashingConfig,
    ServerConfig, DEVELOPMENT_JWT_SECRET,
};
