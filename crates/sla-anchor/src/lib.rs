//! Anchor client for status list documents.
//!
//! Publishes `(listId, uri, hash, version)` tuples to the anchor ledger and
//! verifies published documents against them. Ledger access and document
//! retrieval sit behind the [`LedgerRpc`] and [`DocumentFetcher`] traits.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod retry;
pub mod rpc;

pub use client::{AnchorClient, AnchorOutcome, AnchorStatus, VerifyReport};
pub use config::AnchorClientConfig;
pub use error::{AnchorError, AnchorResult};
pub use fetch::{
    resolve_uri, DocumentFetcher, FetchError, HttpFetcher, MemoryFetcher, ResolvedUri,
    DEFAULT_IPFS_GATEWAY,
};
pub use index::{FsVersionIndex, InMemoryVersionIndex, IndexEntry, VersionIndex};
pub use retry::{with_retry, Exhausted, RetryPolicy};
pub use rpc::{AnchorSubmission, LedgerRpc, LocalLedgerRpc, RevertReason, RpcError, TxReceipt};
