//! Custom error types for relay settings calculation.
//!
//! This module provides fine-grained error handling for input validation,
//! curve selection, configuration loading and chart rendering.

use thiserror::Error;

/// Main error type for relay settings operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A current or other numeric input outside its valid domain.
    #[error("Invalid input for {field}: {value}. {reason}")]
    InvalidInput {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Curve family name not recognized.
    #[error("Unknown curve family '{0}'. Use: standard, very, or extreme")]
    InvalidCurveFamily(String),

    /// Unrecognized command or switch value.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Policy or config value that cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reading or writing the config file.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Failure producing a chart image.
    #[error("Render error: {0}")]
    Render(String),
}

impl RelayError {
    /// Shorthand for a non-positive or non-finite current.
    pub fn non_positive_current(field: &'static str, value: f64) -> Self {
        RelayError::InvalidInput {
            field,
            value,
            reason: "Current must be a finite value greater than 0 A.",
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_message() {
        let err = RelayError::non_positive_current("fault current", 0.0);
        let msg = err.to_string();
        assert!(msg.contains("fault current"));
        assert!(msg.contains("greater than 0 A"));
    }

    #[test]
    fn test_curve_family_message() {
        let err = RelayError::InvalidCurveFamily("moderate".into());
        assert!(err.to_string().contains("'moderate'"));
    }
}
