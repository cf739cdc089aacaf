/*!
 * Error types for the loctrans application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when calling a translation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The service asked us to slow down (HTTP 429, quota exhausted)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Credentials were rejected or are missing
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The service could not be reached or answered with a server error
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Anything else, including unparseable responses
    #[error("Backend error: {0}")]
    Unknown(String),
}

impl BackendError {
    /// Rate-limit and connection class failures, which warrant rotating
    /// to another endpoint and a longer backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::ServiceUnavailable(_)
        )
    }

    /// Short name of the error kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate-limited",
            Self::Timeout(_) => "timeout",
            Self::InvalidCredentials(_) => "invalid-credentials",
            Self::ServiceUnavailable(_) => "service-unavailable",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Configuration problems detected before any translation starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A configured column is not present in the header row
    #[error("Column '{0}' does not exist in the input")]
    MissingColumn(String),

    /// A backend that needs credentials has none
    #[error("Backend '{0}' requires an API key")]
    MissingCredentials(String),

    /// The backend has no language code for a column
    #[error("Backend '{backend}' has no language code for column '{column}'")]
    UnsupportedLanguage {
        /// Logical column code
        column: String,
        /// Backend identifier
        backend: String,
    },

    /// Any other invalid setting
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from reading or writing tabular data
#[derive(Error, Debug)]
pub enum TableError {
    /// Underlying file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV data
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input has no header row
    #[error("Input has no header row")]
    EmptyHeader,
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a backend
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Error in the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from the row source or sink
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
