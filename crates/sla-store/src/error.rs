use sla_statuslist::StatusListError;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document is stored under the list name.
    #[error("status list not found: {0}")]
    NotFound(String),

    /// A document already exists under the list name (or exists with
    /// different parameters than requested).
    #[error("status list already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic concurrency failure. The caller should re-read and retry.
    #[error("stale write to {list}: stored version {stored}, attempted {attempted}")]
    StaleWrite {
        list: String,
        stored: String,
        attempted: String,
    },

    #[error("invalid list name {name:?}: {reason}")]
    InvalidListName { name: String, reason: String },

    /// Stored bytes do not parse or do not match their recorded hash.
    #[error("corrupt status list {list}: {reason}")]
    Corrupt { list: String, reason: String },

    /// A model operation failed for a specific list.
    #[error("{operation} on {list} failed: {source}")]
    Model {
        list: String,
        operation: &'static str,
        #[source]
        source: StatusListError,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn model<'a>(
        list: &'a str,
        operation: &'static str,
    ) -> impl FnOnce(StatusListError) -> Self + 'a {
        move |source| Self::Model {
            list: list.to_string(),
            operation,
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
