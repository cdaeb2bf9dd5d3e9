use sla_types::{AccountId, ListId};

use crate::roles::Role;

/// Reverts produced by the anchor contract.
///
/// A reverted transition leaves contract state untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("unauthorized: {account} lacks role {role}")]
    Unauthorized { account: AccountId, role: Role },

    #[error("version must increase for {list_id}: current {}, attempted {attempted}", fmt_current(.current))]
    VersionMustIncrease {
        list_id: ListId,
        current: Option<u64>,
        attempted: u64,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot remove the last admin {0}")]
    LastAdmin(AccountId),

    #[error("serialization error: {0}")]
    Serialization(String),
}

fn fmt_current(current: &Option<u64>) -> String {
    match current {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

impl LedgerError {
    /// Revert string as a contract client would see it.
    pub fn revert_reason(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::VersionMustIncrease { .. } => "version must increase",
            Self::InvalidInput(_) => "invalid input",
            Self::LastAdmin(_) => "last admin",
            Self::Serialization(_) => "serialization",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
