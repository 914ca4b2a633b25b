//! Error types for the kiosk core

use thiserror::Error;

/// Result type alias for kiosk core operations
pub type KioskResult<T> = Result<T, KioskError>;

/// Errors raised by configuration and the backend collaborators.
///
/// None of these reach the customer directly: the orchestrator maps each one to
/// a spoken phrase or a degraded state (empty menu, failed order).
#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Payment error: {0}")]
    Payment(String),
}

impl From<config::ConfigError> for KioskError {
    fn from(err: config::ConfigError) -> Self {
        KioskError::Config(err.to_string())
    }
}
