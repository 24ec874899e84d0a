//! Application configuration

use std::env;
use std::str::FromStr;

use crate::auth::jwt::MIN_SECRET_LEN;
use crate::auth::validation::MIN_PASSWORD_LENGTH;

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub log_format: LogFormat,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub store_timeout_ms: u64,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub password_min_length: usize,
    pub login_min_response_ms: u64,

    // Feature flags
    pub enable_signup: bool,
}

/// Read an optional variable, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            log_format: env_or("LOG_FORMAT", LogFormat::Pretty),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", 5000),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < MIN_SECRET_LEN {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: {
                let hours = env_or("JWT_EXPIRY_HOURS", 24i64);
                if hours <= 0 {
                    return Err(ConfigError::Invalid("JWT_EXPIRY_HOURS must be positive"));
                }
                hours
            },
            password_min_length: env_or("PASSWORD_MIN_LENGTH", MIN_PASSWORD_LENGTH)
                .max(MIN_PASSWORD_LENGTH),
            login_min_response_ms: env_or("LOGIN_MIN_RESPONSE_MS", 500),

            // Feature flags
            enable_signup: env_or("ENABLE_SIGNUP", true),
        })
    }

    /// Configuration for in-process tests; no environment involved
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            log_format: LogFormat::Pretty,
            database_url: "postgres://localhost/quillhub_test".to_string(),
            database_max_connections: 1,
            store_timeout_ms: 5000,
            jwt_secret: "test-jwt-secret-must-be-at-least-32-characters-long".to_string(),
            jwt_expiry_hours: 24,
            password_min_length: MIN_PASSWORD_LENGTH,
            login_min_response_ms: 0,
            enable_signup: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
