//! Runtime configuration, read from the environment (`.env` in development).

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub store_path: PathBuf,
    pub store_timeout: Duration,
    pub store_retries: u32,
    pub cursor_ttl: Duration,
    pub cursor_sweep: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup("TELOXIDE_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("TELOXIDE_TOKEN".to_string()))?;

        let store_path = lookup("PROFILE_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("database.json"));

        let store_timeout = Duration::from_millis(number(&lookup, "STORE_TIMEOUT_MS", 5000, 1)?);
        let store_retries = number(&lookup, "STORE_RETRIES", 2, 0)?;
        let cursor_ttl = Duration::from_secs(number(&lookup, "CURSOR_TTL_SECS", 1800, 0)?);
        let cursor_sweep = Duration::from_secs(number(&lookup, "CURSOR_SWEEP_SECS", 600, 1)?);

        Ok(Self {
            bot_token,
            store_path,
            store_timeout,
            store_retries: u32::try_from(store_retries).unwrap_or(u32::MAX),
            cursor_ttl,
            cursor_sweep,
        })
    }
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    min: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    if value < min {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("must be at least {}", min),
        ));
    }
    Ok(value)
}
