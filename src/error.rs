//! Error types for the Flux future runtime
//!
//! These are host-level failures only. A value thrown by a handler or an
//! initializer is a [`crate::value::Value`] and travels through rejections,
//! never through these types.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the Flux future runtime
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task budget of {budget} exhausted with {pending} tasks still queued")]
    BudgetExhausted { budget: usize, pending: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("CLI error: {0}")]
    Cli(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type alias for Flux operations
pub type FluxResult<T> = Result<T, FluxError>;

impl FluxError {
    /// Error for a constructor argument that cannot be called
    pub fn not_callable(what: &str, found: &str) -> Self {
        Self::InvalidArgument(format!("{} must be a function, found {}", what, found))
    }
}

impl From<std::io::Error> for FluxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
