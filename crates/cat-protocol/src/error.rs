//! Error types for CAT dialect parsing and translation

use thiserror::Error;

/// Errors that can occur while decoding dialect data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Record does not have the fixed width of its dialect
    #[error("invalid record length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A fixed-width field holds something other than its declared format
    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Unknown status-word property name
    #[error("unknown status property: {0}")]
    UnknownProperty(String),

    /// A value could not be carried across dialects
    #[error(transparent)]
    Translation(#[from] TranslationError),
}

/// Errors translating a value between dialects or canonical units
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// Mode code not defined in the given dialect
    #[error("unmapped {dialect} mode code: {code:?}")]
    UnmappedModeCode { dialect: &'static str, code: String },

    /// Mode name not known to the canonical model
    #[error("unknown mode name: {0:?}")]
    UnknownMode(String),

    /// No filter table exists for the mode
    #[error("no filter table for mode {0}")]
    UnmappedFilterMode(&'static str),

    /// Filter code outside the table for the mode
    #[error("unmapped filter code {code:?} for mode {mode}")]
    UnmappedFilterCode { mode: &'static str, code: String },

    /// AGC code not defined in the given dialect
    #[error("unmapped {dialect} AGC code: {code:?}")]
    UnmappedAgcCode { dialect: &'static str, code: String },
}
