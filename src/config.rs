//! Configuration management for Agent Studio.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `APP_DB_PATH` - Optional. SQLite database file. Defaults to `./app_data.db`.
//! - `JWT_SECRET` - Optional. HS256 signing secret. Defaults to a development value.
//! - `JWT_TTL_HOURS` - Optional. Token lifetime. Defaults to `24`.
//! - `PASSWORD_HASH_ROUNDS` - Optional. PBKDF2 iterations for new hashes. Defaults to `100000`.
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - Optional. Seeded admin account on an empty database.
//! - `OPENROUTER_API_KEY` - Optional. Enables the agent runtime.
//! - `DEFAULT_MODEL` - Optional. Defaults to `google/gemini-2.5-flash`.
//! - `MAX_ITERATIONS` - Optional. Model calls per agent run. Defaults to `20`.
//! - `THINKING_BUDGET` - Optional. Reasoning tokens per call, `0` disables. Defaults to `1024`.

use std::path::PathBuf;
use thiserror::Error;

use crate::util::env_var_parse;

pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Token and password settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,

    /// Token lifetime in hours
    pub token_ttl_hours: i64,

    /// PBKDF2 iterations used when hashing new passwords
    pub password_hash_rounds: u32,
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Account created when the user table is empty.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub user_id: String,
    pub password: String,
}

/// Model and agent loop settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// OpenRouter API key; the agent runtime is disabled without it
    pub api_key: Option<String>,

    /// Model identifier (OpenRouter format)
    pub default_model: String,

    /// Maximum model calls per agent run
    pub max_iterations: usize,

    /// Reasoning token budget per call; 0 leaves thinking off
    pub thinking_budget: u64,
}

impl ModelConfig {
    pub fn reasoning_max_tokens(&self) -> Option<u64> {
        (self.thinking_budget > 0).then_some(self.thinking_budget)
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,

    pub port: u16,

    /// SQLite database file
    pub db_path: PathBuf,

    pub auth: AuthConfig,

    pub admin: AdminSeed,

    pub model: ModelConfig,
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var_parse(name, default).map_err(|e| ConfigError::InvalidValue(name.to_string(), e))
}

fn string_env(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = string_env("HOST", "127.0.0.1");
        let port = parse_env("PORT", 8000u16)?;
        let db_path = PathBuf::from(string_env("APP_DB_PATH", "./app_data.db"));

        let token_ttl_hours = parse_env("JWT_TTL_HOURS", 24i64)?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue(
                "JWT_TTL_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }
        let password_hash_rounds = parse_env("PASSWORD_HASH_ROUNDS", 100_000u32)?;
        if password_hash_rounds == 0 {
            return Err(ConfigError::InvalidValue(
                "PASSWORD_HASH_ROUNDS".to_string(),
                "must be positive".to_string(),
            ));
        }
        let auth = AuthConfig {
            jwt_secret: string_env("JWT_SECRET", DEV_JWT_SECRET),
            token_ttl_hours,
            password_hash_rounds,
        };

        let admin = AdminSeed {
            user_id: string_env("ADMIN_EMAIL", "admin@example.com"),
            password: string_env("ADMIN_PASSWORD", "admin123"),
        };

        let model = ModelConfig {
            api_key: std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            default_model: string_env("DEFAULT_MODEL", "google/gemini-2.5-flash"),
            max_iterations: parse_env("MAX_ITERATIONS", 20usize)?,
            thinking_budget: parse_env("THINKING_BUDGET", 1024u64)?,
        };

        Ok(Self {
            host,
            port,
            db_path,
            auth,
            admin,
            model,
        })
    }

    /// Create a config with custom values (useful for testing).
    ///
    /// Uses a cheap hash round count so tests stay fast.
    pub fn new(db_path: PathBuf, jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            db_path,
            auth: AuthConfig {
                jwt_secret: jwt_secret.into(),
                token_ttl_hours: 24,
                password_hash_rounds: 1_000,
            },
            admin: AdminSeed {
                user_id: "admin@example.com".to_string(),
                password: "admin123".to_string(),
            },
            model: ModelConfig {
                api_key: None,
                default_model: "google/gemini-2.5-flash".to_string(),
                max_iterations: 20,
                thinking_budget: 1024,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinking_budget_zero_disables_reasoning() {
        let mut config = Config::new(PathBuf::from(":memory:"), "secret");
        assert_eq!(config.model.reasoning_max_tokens(), Some(1024));
        config.model.thinking_budget = 0;
        assert_eq!(config.model.reasoning_max_tokens(), None);
    }

    #[test]
    fn dev_secret_is_detected() {
        let config = Config::new(PathBuf::from(":memory:"), DEV_JWT_SECRET);
        assert!(config.auth.uses_dev_secret());
        let config = Config::new(PathBuf::from(":memory:"), "prod-secret");
        assert!(!config.auth.uses_dev_secret());
    }

    #[test]
    fn invalid_number_is_config_error() {
        std::env::set_var("AGENT_STUDIO_TEST_CFG_NUM", "many");
        let err = parse_env::<usize>("AGENT_STUDIO_TEST_CFG_NUM", 1).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(ref name, _) if name == "AGENT_STUDIO_TEST_CFG_NUM"
        ));
    }
}
