//! Error types for ENVI reading and writing.

use hsi_common::HsiError;
use thiserror::Error;

/// Result type for ENVI operations.
pub type EnviResult<T> = Result<T, EnviError>;

/// Error types for ENVI parsing and streaming.
#[derive(Error, Debug)]
pub enum EnviError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required header field
    #[error("Missing required header field: {0}")]
    MissingField(String),

    /// Malformed header content
    #[error("Invalid header format: {0}")]
    InvalidFormat(String),

    /// Data type code outside the supported set
    #[error("Unsupported data type code: {0}")]
    UnsupportedDataType(u32),

    /// Value cannot be stored in the file's sample type
    #[error("Value {value} is not representable as {data_type}")]
    Unrepresentable { value: f64, data_type: String },
}

impl From<EnviError> for HsiError {
    fn from(err: EnviError) -> Self {
        match err {
            EnviError::IoError(e) => HsiError::Io(e),
            EnviError::MissingField(field) => HsiError::MissingField(field),
            EnviError::InvalidFormat(msg) => HsiError::invalid_header("header", msg),
            EnviError::UnsupportedDataType(code) => {
                HsiError::invalid_header("data type", format!("unsupported code {}", code))
            }
            other @ EnviError::Unrepresentable { .. } => {
                HsiError::invalid_header("data type", other.to_string())
            }
        }
    }
}
