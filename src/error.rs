//! Error types for the triage engine
//!
//! The engine raises exactly three kinds of error. Everything else
//! (file I/O, configuration loading, startup) is the caller's concern and
//! travels as `anyhow::Error`.

use thiserror::Error;

/// Errors originating inside the decision engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Member outputs do not match the configured label set or member count
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A member output is not a valid probability distribution
    #[error("Invalid probability vector: {0}")]
    InvalidProbability(String),

    /// Invalid calibration or label configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Stable tag used when reporting the error to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ShapeMismatch(_) => "shape_mismatch",
            EngineError::InvalidProbability(_) => "invalid_probability",
            EngineError::Config(_) => "config",
        }
    }
}

/// Convenience Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_tags() {
        assert_eq!(
            EngineError::ShapeMismatch("x".into()).kind(),
            "shape_mismatch"
        );
        assert_eq!(
            EngineError::InvalidProbability("x".into()).kind(),
            "invalid_probability"
        );
        assert_eq!(EngineError::Config("x".into()).kind(), "config");
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::Config("uncertainty >= healthy".into());
        assert_eq!(err.to_string(), "Configuration error: uncertainty >= healthy");
    }
}
