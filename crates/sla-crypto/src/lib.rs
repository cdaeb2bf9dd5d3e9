//! Cryptographic primitives for status list anchoring.
//!
//! Provides the content hasher that produces the digests anchored on the
//! ledger, Ed25519 key handling, and compact JWS (`EdDSA`) signing used to
//! build credential proofs.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod jws;
pub mod signer;

pub use hasher::{ContentHasher, HasherError};
pub use jws::{JwsError, JwsHeader};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
