//! taskgate configuration management
//!
//! Handles configuration from environment variables and TOML files,
//! with defaults suitable for local development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Signing secret used when nothing else is configured.
///
/// Servers started with this value log a warning; it must never reach production.
pub const DEVELOPMENT_JWT_SECRET: &str = "development-secret-key-change-in-production";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Token and password hashing configuration
    pub auth: AuthConfig,

    /// User store configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError { path, message },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Load the file named by `TASKGATE_CONFIG` when set, otherwise the environment alone
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("TASKGATE_CONFIG") {
            Ok(path) => Self::from_file(path)?.with_env_override(),
            Err(_) => Self::from_env(),
        }
    }

    /// Apply every recognised key that `lookup` yields
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Tokens
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(lifetime) = lookup("JWT_LIFETIME_SECS") {
            self.auth.token_lifetime_secs = parse_value("JWT_LIFETIME_SECS", lifetime)?;
        }

        // Password hashing
        if let Some(memory) = lookup("PASSWORD_MEMORY_COST") {
            self.auth.password.memory_cost = parse_value("PASSWORD_MEMORY_COST", memory)?;
        }
        if let Some(time) = lookup("PASSWORD_TIME_COST") {
            self.auth.password.time_cost = parse_value("PASSWORD_TIME_COST", time)?;
        }
        if let Some(parallelism) = lookup("PASSWORD_PARALLELISM") {
            self.auth.password.parallelism = parse_value("PASSWORD_PARALLELISM", parallelism)?;
        }

        // User store
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.postgres_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(size) = lookup("DATABASE_POOL_SIZE") {
            self.database.postgres_pool_size = parse_value("DATABASE_POOL_SIZE", size)?;
        }
        if let Some(timeout) = lookup("STORE_TIMEOUT_SECS") {
            self.database.store_timeout_secs = parse_value("STORE_TIMEOUT_SECS", timeout)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        Ok(())
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.auth.token_lifetime_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_LIFETIME_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.database.store_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "STORE_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.auth.password.max_secret_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "auth.password.max_secret_bytes".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the built-in development secret is still in use
    pub fn uses_development_secret(&self) -> bool {
        self.auth.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_enabled: true,
            // Empty by default - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Token issuance and secret hashing configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret shared by every token issued by this service
    pub jwt_secret: String,

    /// Token lifetime in seconds (default: 86400 = 24 hours)
    pub token_lifetime_secs: u64,

    /// Argon2 work factor
    pub password: PasswordHashingConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            token_lifetime_secs: 24 * 60 * 60,
            password: PasswordHashingConfig::default(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("password", &self.password)
            .finish()
    }
}

/// Argon2id parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordHashingConfig {
    /// Memory cost in KiB (default: 65536 = 64 MB)
    pub memory_cost: u32,

    /// Iterations (default: 3)
    pub time_cost: u32,

    /// Lanes (default: 4)
    pub parallelism: u32,

    /// Longest accepted secret in bytes
    pub max_secret_bytes: usize,
}

impl Default for PasswordHashingConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            max_secret_bytes: 72,
        }
    }
}

/// User store configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    pub postgres_url: Option<String>,

    /// PostgreSQL connection pool size
    pub postgres_pool_size: u32,

    /// Upper bound for a single store call, in seconds
    pub store_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            postgres_pool_size: 10,
            store_timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field(
                "postgres_url",
                &self.postgres_url.as_ref().map(|_| "<redacted>"),
            )
            .field("postgres_pool_size", &self.postgres_pool_size)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_lifetime_secs, 86400);
        assert_eq!(config.database.store_timeout_secs, 10);
        assert_eq!(config.auth.password.max_secret_bytes, 72);
        assert!(config.database.postgres_url.is_none());
        assert!(config.uses_development_secret());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("API_PORT", "9090"),
                ("JWT_SECRET", "a-real-secret"),
                ("JWT_LIFETIME_SECS", "600"),
                ("DATABASE_URL", "postgres://localhost/taskgate"),
                ("STORE_TIMEOUT_SECS", "3"),
                ("CORS_ORIGINS", "http://a.test, ,http://b.test"),
                ("LOG_JSON", "true"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.auth.jwt_secret, "a-real-secret");
        assert_eq!(config.auth.token_lifetime_secs, 600);
        assert_eq!(
            config.database.postgres_url.as_deref(),
            Some("postgres://localhost/taskgate")
        );
        assert_eq!(config.database.store_timeout_secs, 3);
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.logging.json_format);
        assert!(!config.uses_development_secret());
    }

    #[test]
    fn test_invalid_override_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("API_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "API_PORT"));
    }

    #[test]
    fn test_empty_database_url_means_in_memory() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup_from(&[("DATABASE_URL", "")]))
            .unwrap();
        assert!(config.database.postgres_url.is_none());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let mut config = AppConfig::default();
        config.auth.token_lifetime_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.store_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 3000

            [auth]
            jwt_secret = "from-file"

            [auth.password]
            memory_cost = 19456
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.jwt_secret, "from-file");
        assert_eq!(config.auth.token_lifetime_secs, 86400);
        assert_eq!(config.auth.password.memory_cost, 19456);
        assert_eq!(config.auth.password.time_cost, 3);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "super-secret-value".to_string();
        config.database.postgres_url = Some("postgres://user:pw@host/db".to_string());

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(!rendered.contains("user:pw"));
    }
}
