//! Error types for the deploy server

use thiserror::Error;

use crate::command::CommandError;

/// Main error type for the deploy server
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{0}")]
    CommandError(#[from] CommandError),

    #[error("Invalid filter: {0}")]
    FilterError(#[from] regex::Error),

    #[error("Key-value error: {0}")]
    KeyValueError(String),

    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

