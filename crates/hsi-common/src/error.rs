//! Error types for the resampling crates.

use thiserror::Error;

/// Result type alias using HsiError.
pub type Result<T> = std::result::Result<T, HsiError>;

/// Primary error type for resampling jobs.
///
/// Every variant is fatal for the job that raised it. Coverage gaps and
/// extrapolated wavelengths are not errors and never surface here.
#[derive(Debug, Error)]
pub enum HsiError {
    // === Header / metadata errors ===
    #[error("Missing required header field: {0}")]
    MissingField(String),

    #[error("Invalid header value for '{field}': {message}")]
    InvalidHeader { field: String, message: String },

    #[error("Invalid georeference: {0}")]
    Geometry(String),

    // === Algorithm errors ===
    #[error("Cannot aggregate {axis} axis of length {len} into blocks of {bin}")]
    AggregationUnderflow {
        axis: &'static str,
        len: usize,
        bin: usize,
    },

    #[error("Interpolation failed: {0}")]
    Interpolation(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid state transition: {0}")]
    State(String),

    // === Environment errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HsiError {
    /// Create a Geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an Interpolation error.
    pub fn interpolation(msg: impl Into<String>) -> Self {
        Self::Interpolation(msg.into())
    }

    /// Create a ShapeMismatch error from two `rows x cols` pairs.
    pub fn shape_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch {
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error was caused by the underlying storage rather than
    /// by the data or the parameters.
    pub fn is_io(&self) -> bool {
        matches!(self, HsiError::Io(_))
    }
}

impl From<serde_yaml::Error> for HsiError {
    fn from(err: serde_yaml::Error) -> Self {
        HsiError::Config(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underflow_message() {
        let err = HsiError::AggregationUnderflow {
            axis: "line",
            len: 20,
            bin: 30,
        };
        assert_eq!(
            err.to_string(),
            "Cannot aggregate line axis of length 20 into blocks of 30"
        );
    }

    #[test]
    fn test_io_conversion() {
        let err: HsiError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_io());
        assert!(!HsiError::geometry("no pixel size").is_io());
    }
}
