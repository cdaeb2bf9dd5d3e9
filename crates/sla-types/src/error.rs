use thiserror::Error;

/// Errors produced by type parsing and conversion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown status purpose: {0}")]
    UnknownPurpose(String),

    #[error("invalid account identifier: {0:?}")]
    InvalidAccount(String),

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
}
