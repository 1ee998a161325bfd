use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a valid number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

/// Without a `url` records are kept by the in-memory record store.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                environment: "development".to_string(),
                rust_log: "train_tickets=debug,tower_http=debug".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                pool_size: 10,
                acquire_timeout_secs: 5,
            },
            persistence: PersistenceConfig {
                queue_capacity: 1024,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys fall back
    /// to `Config::default()`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            app: AppConfig {
                host: lookup("HOST").unwrap_or(defaults.app.host),
                port: parse_or(&lookup, "PORT", defaults.app.port)?,
                environment: lookup("ENVIRONMENT").unwrap_or(defaults.app.environment),
                rust_log: lookup("RUST_LOG").unwrap_or(defaults.app.rust_log),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
                pool_size: parse_or(&lookup, "DB_POOL_SIZE", defaults.database.pool_size)?,
                acquire_timeout_secs: parse_or(
                    &lookup,
                    "DB_ACQUIRE_TIMEOUT_SECONDS",
                    defaults.database.acquire_timeout_secs,
                )?,
            },
            persistence: PersistenceConfig {
                queue_capacity: parse_or(
                    &lookup,
                    "PERSISTENCE_QUEUE_CAPACITY",
                    defaults.persistence.queue_capacity,
                )?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}
