//! Foundation types for status list anchoring.
//!
//! Every other `sla-*` crate depends on this one. It holds the small value
//! types that cross crate boundaries: the content digest shared between the
//! off-chain document and its on-chain anchor, the 32-byte ledger list
//! identifier, ledger account identities, the status purpose enum, and the
//! injectable clock.
//!
//! # Key Types
//!
//! - [`Digest`]: 256-bit BLAKE2b content digest, hex on the wire
//! - [`ListId`]: 32-byte ledger-side identifier of a status list
//! - [`AccountId`]: identity of a ledger account (caller / updater)
//! - [`StatusPurpose`]: `revocation` or `suspension`
//! - [`Clock`]: time source, [`SystemClock`] in production, [`FixedClock`] in tests

pub mod digest;
pub mod error;
pub mod identity;
pub mod purpose;
pub mod temporal;

pub use digest::Digest;
pub use error::TypeError;
pub use identity::{AccountId, ListId};
pub use purpose::StatusPurpose;
pub use temporal::{
    canonical_timestamp, parse_timestamp, truncate_to_millis, Clock, FixedClock, SystemClock,
};
