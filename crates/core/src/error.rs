//! Error types for Waypoint.
//!
//! This module defines a unified error enum that covers all error categories
//! in the workspace: configuration, I/O, generation services, knowledge
//! indexing, prompts and caller input.

use thiserror::Error;

/// Unified error type for Waypoint.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Library code does not panic on bad input; errors are represented and
/// propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation service errors (network, non-2xx, malformed payloads)
    #[error("LLM error: {0}")]
    Llm(String),

    /// The generation service reported that the requested model does not exist
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Chunking, embedding and index errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Rejected caller input (empty task, empty document, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_json_conversion() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
