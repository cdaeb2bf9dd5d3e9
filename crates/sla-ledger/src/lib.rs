//! Anchor ledger contract.
//!
//! An in-process state machine with the semantics of the on-chain anchor
//! contract: one [`AnchorRecord`] per [`ListId`](sla_types::ListId), whose
//! version strictly increases, writable only by accounts holding
//! [`Role::Anchorer`]. Reads are open to anyone.
//!
//! The contract is the reference implementation behind `LedgerRpc` in
//! `sla-anchor` and the local ledger file used by the CLI.

pub mod contract;
pub mod error;
pub mod record;
pub mod roles;

pub use contract::{AnchorContract, ContractConfig, ContractSnapshot};
pub use error::{LedgerError, LedgerResult};
pub use record::{AnchorReceipt, AnchorRecord, LedgerEvent};
pub use roles::Role;
