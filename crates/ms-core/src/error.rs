//! Error types for muonshield

use thiserror::Error;

/// muonshield error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Precondition violated by the inputs (charges, parameter vector, options).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport engine failure. Fatal to the worker and to the run.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Worker outputs that cannot be combined into one dataset.
    #[error("Inconsistent results: {0}")]
    Inconsistent(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
