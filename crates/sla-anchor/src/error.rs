use sla_statuslist::StatusListError;
use sla_store::StoreError;
use sla_types::{Digest, ListId};

use crate::fetch::FetchError;

/// Errors from anchoring and verification.
///
/// A hash mismatch found by `verify` is not an error; it is reported through
/// [`VerifyReport::ok`](crate::VerifyReport).
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// Transport failure that persisted through every retry.
    #[error("{operation} failed after {attempts} attempt(s): {reason}")]
    NetworkFailure {
        operation: String,
        attempts: u32,
        reason: String,
    },

    /// The submitting account lacks the anchor role. Not retried.
    #[error("unauthorized to anchor {list_id}: {reason}")]
    Unauthorized { list_id: ListId, reason: String },

    /// The ledger already holds this or a newer version, and not the tuple
    /// that was submitted. Not retried.
    #[error("ledger version for {list_id} must increase: on-chain {}, attempted {attempted}", fmt_version(.current))]
    VersionMustIncrease {
        list_id: ListId,
        current: Option<u64>,
        attempted: u64,
    },

    /// Any other ledger revert.
    #[error("ledger rejected anchor of {list_id}: {reason}")]
    Rejected { list_id: ListId, reason: String },

    #[error("no anchor recorded for {0}")]
    NotFound(ListId),

    /// Non-retriable fetch failure.
    #[error("fetch of {uri} failed: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: FetchError,
    },

    /// The document's recorded hash does not match its contents.
    #[error("document integrity failure for {list_id}: recorded {recorded}, computed {computed}")]
    DocumentIntegrity {
        list_id: ListId,
        recorded: Digest,
        computed: Digest,
    },

    /// The document is older than the last one anchored for this list.
    #[error("version regression for {list_id}: last anchored {anchored}, attempted {attempted}")]
    VersionRegression {
        list_id: ListId,
        anchored: String,
        attempted: String,
    },

    #[error("version index error: {0}")]
    Index(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] StatusListError),
}

fn fmt_version(current: &Option<u64>) -> String {
    match current {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

/// Result alias for anchor client operations.
pub type AnchorResult<T> = Result<T, AnchorError>;
