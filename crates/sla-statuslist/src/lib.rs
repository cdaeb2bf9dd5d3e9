//! Status list model.
//!
//! A status list is a fixed-capacity bitmap where bit `i` records whether the
//! credential allocated index `i` is revoked (or suspended). This crate holds
//! the pure parts of the system:
//!
//! - [`Bitset`]: the bitmap and its unpadded URL-safe base64 encoding
//! - [`DocumentVersion`]: the hybrid-logical-clock version token
//! - [`StatusListDocument`]: the content-addressed document and its update rule
//! - [`UnsignedCredential`] / [`CredentialSigner`]: the StatusList2021 projection
//!
//! Nothing here performs I/O; storage and anchoring live in `sla-store` and
//! `sla-anchor`.

pub mod bitset;
pub mod credential;
pub mod document;
pub mod error;
pub mod version;

pub use bitset::Bitset;
pub use credential::{
    verify_credential, CredentialSigner, CredentialSubject, Ed25519JwsSigner, Proof,
    SignedCredential, UnsignedCredential,
};
pub use document::{compute_hash, CanonicalFields, StatusListDocument};
pub use error::{StatusListError, StatusListResult};
pub use version::DocumentVersion;
