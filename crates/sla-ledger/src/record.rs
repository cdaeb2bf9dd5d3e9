use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sla_types::{AccountId, Digest, ListId};

use crate::roles::Role;

/// Ledger-resident anchor of one status list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRecord {
    pub list_id: ListId,
    pub uri: String,
    pub hash: Digest,
    pub version: u64,
    /// Block time of the anchoring transaction.
    #[serde(with = "sla_types::temporal::canonical")]
    pub updated_at: DateTime<Utc>,
    pub updater: AccountId,
    pub block: u64,
}

/// Events emitted by the contract, in block order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    StatusListAnchored {
        list_id: ListId,
        uri: String,
        hash: Digest,
        version: u64,
        updater: AccountId,
        block: u64,
    },
    RoleGranted {
        role: Role,
        account: AccountId,
        sender: AccountId,
        block: u64,
    },
    RoleRevoked {
        role: Role,
        account: AccountId,
        sender: AccountId,
        block: u64,
    },
}

impl LedgerEvent {
    pub fn block(&self) -> u64 {
        match self {
            Self::StatusListAnchored { block, .. }
            | Self::RoleGranted { block, .. }
            | Self::RoleRevoked { block, .. } => *block,
        }
    }

    /// The list this event anchors, if it is an anchoring event.
    pub fn anchored_list(&self) -> Option<&ListId> {
        match self {
            Self::StatusListAnchored { list_id, .. } => Some(list_id),
            _ => None,
        }
    }
}

/// Result of a successful state-changing transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    pub tx_hash: Digest,
    pub block: u64,
    pub event: LedgerEvent,
}
