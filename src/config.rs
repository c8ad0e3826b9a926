use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?} is not a number")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub submit_delay_ms: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
            submit_delay_ms: 2000,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, after a best-effort `.env` load.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            api_base_url: get_var_or("SCHOLARSHIP_API_URL", &defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            timeout_secs: parse_var("SCHOLARSHIP_TIMEOUT_SECS", defaults.timeout_secs)?,
            max_retries: parse_var("SCHOLARSHIP_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: parse_var(
                "SCHOLARSHIP_RETRY_BACKOFF_MS",
                defaults.retry_backoff_ms,
            )?,
            submit_delay_ms: parse_var("SCHOLARSHIP_SUBMIT_DELAY_MS", defaults.submit_delay_ms)?,
            log_level: get_var_or("LOG_LEVEL", &defaults.log_level),
        })
    }

    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        Err(_) => Ok(default),
    }
}
