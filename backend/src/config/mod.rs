//! Configuration module for the prompt library backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Default quiet period before a search input is committed to the filter store.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Default idle time before a filter session is evicted.
pub const DEFAULT_FILTER_SESSION_IDLE_SECS: u64 = 30 * 60;

/// Default bound on the number of live filter sessions.
pub const DEFAULT_MAX_FILTER_SESSIONS: usize = 10_000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Debounce window for search input
    pub search_debounce: Duration,
    /// Limit applied to listings that do not ask for one
    pub default_limit: Option<usize>,
    /// Shared secret the provider gateway sends with provider sign-ins
    pub provider_secret: Option<String>,
    /// Idle time after which an unused filter session is dropped
    pub filter_session_idle: Duration,
    /// Upper bound on live filter sessions
    pub max_filter_sessions: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("PROMPT_LIBRARY_DB_PATH")
            .unwrap_or_else(|_| "./data/prompts.sqlite".to_string())
            .into();

        let bind_addr = env::var("PROMPT_LIBRARY_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| {
                AppError::Validation(format!("Invalid PROMPT_LIBRARY_BIND_ADDR format: {}", e))
            })?;

        let log_level = env::var("PROMPT_LIBRARY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let debounce_ms = match env::var("PROMPT_LIBRARY_SEARCH_DEBOUNCE_MS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                AppError::Validation(format!("Invalid PROMPT_LIBRARY_SEARCH_DEBOUNCE_MS: {}", e))
            })?,
            Err(_) => DEFAULT_SEARCH_DEBOUNCE_MS,
        };

        let default_limit = match env::var("PROMPT_LIBRARY_DEFAULT_LIMIT") {
            Ok(raw) => Some(raw.parse::<usize>().map_err(|e| {
                AppError::Validation(format!("Invalid PROMPT_LIBRARY_DEFAULT_LIMIT: {}", e))
            })?),
            Err(_) => None,
        };

        let provider_secret = env::var("PROMPT_LIBRARY_PROVIDER_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let idle_secs = match env::var("PROMPT_LIBRARY_FILTER_SESSION_IDLE_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                AppError::Validation(format!(
                    "Invalid PROMPT_LIBRARY_FILTER_SESSION_IDLE_SECS: {}",
                    e
                ))
            })?,
            Err(_) => DEFAULT_FILTER_SESSION_IDLE_SECS,
        };

        let max_filter_sessions = match env::var("PROMPT_LIBRARY_MAX_FILTER_SESSIONS") {
            Ok(raw) => raw.parse::<usize>().map_err(|e| {
                AppError::Validation(format!("Invalid PROMPT_LIBRARY_MAX_FILTER_SESSIONS: {}", e))
            })?,
            Err(_) => DEFAULT_MAX_FILTER_SESSIONS,
        };

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            search_debounce: Duration::from_millis(debounce_ms),
            default_limit,
            provider_secret,
            filter_session_idle: Duration::from_secs(idle_secs),
            max_filter_sessions,
        })
    }
}
