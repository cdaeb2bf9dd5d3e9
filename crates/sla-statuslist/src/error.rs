/// Errors from the status list model.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StatusListError {
    /// Bit index outside `[0, capacity)`.
    #[error("index {index} out of bounds for capacity {capacity}")]
    IndexOutOfBounds { index: usize, capacity: usize },

    /// The encoded list does not decode to a valid bitset of the declared
    /// capacity. Stored data is corrupt.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// A list must hold at least one bit.
    #[error("invalid capacity: {0}")]
    InvalidCapacity(usize),

    /// A version token could not be parsed.
    #[error("invalid version token {value:?}: {reason}")]
    InvalidVersion { value: String, reason: String },

    /// The same-millisecond counter is at its maximum and the clock has not
    /// moved past the version's timestamp.
    #[error("version {0} has no successor until the clock advances")]
    VersionExhausted(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Credential signing or proof verification failed.
    #[error("signing error: {0}")]
    Signing(String),
}

/// Result alias for status list operations.
pub type StatusListResult<T> = Result<T, StatusListError>;
