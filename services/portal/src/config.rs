//! services/portal/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at process start.
//! The `.env` file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Backend project identifier (metadata store).
    pub project_id: String,
    /// API key for the metadata store, blob store and identity provider.
    pub api_key: String,
    /// Bucket name for the blob store.
    pub storage_bucket: String,
    /// API key for the generative text service.
    pub gemini_api_key: String,
    /// Primary model tried first for every assistant request.
    pub primary_model: String,
    /// Fallback model tried when the primary fails.
    pub fallback_model: String,
    /// Interval between collection-snapshot fetches on the live subscription.
    pub poll_interval: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Backend project settings ---
        let project_id = std::env::var("PORTAL_PROJECT_ID")
            .map_err(|_| ConfigError::MissingVar("PORTAL_PROJECT_ID".to_string()))?;
        let api_key = std::env::var("PORTAL_API_KEY")
            .map_err(|_| ConfigError::MissingVar("PORTAL_API_KEY".to_string()))?;
        let storage_bucket = std::env::var("PORTAL_STORAGE_BUCKET")
            .unwrap_or_else(|_| format!("{}.appspot.com", project_id));

        // --- Generative model settings ---
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let primary_model = std::env::var("PRIMARY_MODEL")
            .unwrap_or_else(|_| "gemini-pro-latest".to_string());
        let fallback_model = std::env::var("FALLBACK_MODEL")
            .unwrap_or_else(|_| "gemini-flash-latest".to_string());

        // --- Subscription settings ---
        let poll_interval_str =
            std::env::var("SNAPSHOT_POLL_MS").unwrap_or_else(|_| "5000".to_string());
        let poll_interval_ms = poll_interval_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "SNAPSHOT_POLL_MS".to_string(),
                format!("'{}' is not a valid millisecond count", poll_interval_str),
            )
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            project_id,
            api_key,
            storage_bucket,
            gemini_api_key,
            primary_model,
            fallback_model,
            poll_interval: Duration::from_millis(poll_interval_ms),
            log_level,
        })
    }
}
