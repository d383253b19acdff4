use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::persistence::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the recommendations backend, e.g. `http://localhost:5000/api`.
    pub backend_url: String,
    /// Directory holding the local progress files.
    pub storage_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
    pub sync_max_retries: u32,
    pub sync_retry_base_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            backend_url: require_env("BACKEND_URL")?,
            storage_dir: std::env::var("STORAGE_DIR")
                .unwrap_or_else(|_| ".assessment".to_string())
                .into(),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            sync_max_retries: parse_env("SYNC_MAX_RETRIES", 3)
                .context("SYNC_MAX_RETRIES must be a non-negative integer")?,
            sync_retry_base_ms: parse_env("SYNC_RETRY_BASE_MS", 500)
                .context("SYNC_RETRY_BASE_MS must be a number of milliseconds")?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.sync_max_retries.max(1),
            base_delay: Duration::from_millis(self.sync_retry_base_ms),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(raw.trim().parse::<T>()?),
        Err(_) => Ok(default),
    }
}
