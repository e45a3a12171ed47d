//! Error types for the gateway

use cat_detect::DetectError;
use cat_protocol::{ParseError, TranslationError};
use thiserror::Error;

/// Reply sent to a client whose command could not be executed
pub const ERROR_TOKEN: &str = "?;";

/// Reasons a client command is rejected before touching any state
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No descriptor for the prefix
    #[error("unknown command prefix: {0:?}")]
    UnknownPrefix(String),

    /// Command length matches neither the get nor the set form
    #[error("{prefix}: invalid length {length}")]
    InvalidLength { prefix: String, length: usize },

    /// Suffix is not an integer
    #[error("{prefix}: non-numeric value {value:?}")]
    NotNumeric { prefix: String, value: String },

    /// Suffix outside the descriptor's range
    #[error("{prefix}: value {value} outside {min}..={max}")]
    OutOfRange {
        prefix: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Set attempted on a read-only property
    #[error("{0} is read-only")]
    ReadOnly(String),

    /// Get attempted on a write-only property
    #[error("{0} is write-only")]
    WriteOnly(String),

    /// The addressed slice does not exist
    #[error("slice {0} is not available")]
    SliceUnavailable(usize),
}

/// Errors that can occur in the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Command rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Value could not be translated between dialects
    #[error("translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Status record could not be decoded or updated
    #[error("status word error: {0}")]
    StatusWord(#[from] ParseError),

    /// Port provider failure
    #[error("port provider error: {0}")]
    Provider(#[from] DetectError),

    /// Port number outside the usable range
    #[error("invalid port number: {0}")]
    InvalidPort(u32),

    /// No port or pair with this number
    #[error("port not found: {0}")]
    PortNotFound(u32),

    #[error("unknown port kind: {0}")]
    UnknownPortKind(String),

    /// Descriptor table could not be loaded
    #[error("descriptor table error: {0}")]
    Descriptors(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
