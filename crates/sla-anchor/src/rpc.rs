use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sla_ledger::{AnchorContract, AnchorRecord, LedgerError};
use sla_types::{AccountId, Digest, ListId};

/// Why the ledger refused a transaction, surfaced verbatim to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevertReason {
    #[error("unauthorized")]
    Unauthorized,
    #[error("version must increase")]
    VersionMustIncrease { current: Option<u64>, attempted: u64 },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The transaction executed and reverted. Never retried.
    #[error("reverted: {0}")]
    Reverted(RevertReason),
    /// Connection-level failure; the transaction may or may not have landed.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
}

impl RpcError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<LedgerError> for RpcError {
    fn from(e: LedgerError) -> Self {
        let reason = match e {
            LedgerError::Unauthorized { .. } => RevertReason::Unauthorized,
            LedgerError::VersionMustIncrease {
                current, attempted, ..
            } => RevertReason::VersionMustIncrease { current, attempted },
            other => RevertReason::Other(format!("{}: {other}", other.revert_reason())),
        };
        Self::Reverted(reason)
    }
}

/// Arguments of an anchor transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSubmission {
    pub list_id: ListId,
    pub uri: String,
    pub hash: Digest,
    pub version: u64,
}

impl AnchorSubmission {
    /// Whether `record` holds exactly this tuple.
    pub fn matches(&self, record: &AnchorRecord) -> bool {
        record.list_id == self.list_id
            && record.uri == self.uri
            && record.hash == self.hash
            && record.version == self.version
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: Digest,
    pub block: u64,
}

/// Ledger access as seen by the anchor client.
///
/// Implementations sign and send transactions on behalf of one account.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Read the anchor of `list_id`. No role required.
    async fn call(&self, list_id: &ListId) -> Result<Option<AnchorRecord>, RpcError>;

    /// Submit an anchor transaction and wait for its receipt.
    async fn submit(&self, submission: &AnchorSubmission) -> Result<TxReceipt, RpcError>;
}

/// [`LedgerRpc`] over an in-process [`AnchorContract`], sending as `account`.
pub struct LocalLedgerRpc {
    contract: Arc<AnchorContract>,
    account: AccountId,
}

impl LocalLedgerRpc {
    pub fn new(contract: Arc<AnchorContract>, account: AccountId) -> Self {
        Self { contract, account }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn contract(&self) -> &Arc<AnchorContract> {
        &self.contract
    }
}

#[async_trait]
impl LedgerRpc for LocalLedgerRpc {
    async fn call(&self, list_id: &ListId) -> Result<Option<AnchorRecord>, RpcError> {
        Ok(self.contract.get(list_id))
    }

    async fn submit(&self, submission: &AnchorSubmission) -> Result<TxReceipt, RpcError> {
        let receipt = self.contract.anchor(
            &self.account,
            submission.list_id,
            &submission.uri,
            submission.hash,
            submission.version,
        )?;
        Ok(TxReceipt {
            tx_hash: receipt.tx_hash,
            block: receipt.block,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sla_ledger::ContractConfig;
    use sla_types::FixedClock;

    fn rpc(account: &str) -> (LocalLedgerRpc, Arc<AnchorContract>) {
        let contract = Arc::new(AnchorContract::deploy(
            AccountId::new("admin").unwrap(),
            ContractConfig::default(),
            Arc::new(FixedClock::at_millis(0)),
        ));
        (
            LocalLedgerRpc::new(Arc::clone(&contract), AccountId::new(account).unwrap()),
            contract,
        )
    }

    fn submission(version: u64) -> AnchorSubmission {
        AnchorSubmission {
            list_id: ListId::derive("main"),
            uri: "https://example.org/main.json".into(),
            hash: Digest::of(b"doc"),
            version,
        }
    }

    #[tokio::test]
    async fn submit_then_call() {
        let (rpc, _) = rpc("admin");
        let s = submission(1);
        let receipt = rpc.submit(&s).await.unwrap();
        assert_eq!(receipt.block, 2);
        let record = rpc.call(&s.list_id).await.unwrap().unwrap();
        assert!(s.matches(&record));
    }

    #[tokio::test]
    async fn reverts_are_surfaced_verbatim() {
        let (admin_rpc, _) = rpc("admin");
        admin_rpc.submit(&submission(1)).await.unwrap();
        assert_eq!(
            admin_rpc.submit(&submission(1)).await.unwrap_err(),
            RpcError::Reverted(RevertReason::VersionMustIncrease { current: Some(1), attempted: 1 })
        );

        let (stranger, _) = rpc("stranger");
        let err = stranger.submit(&submission(1)).await.unwrap_err();
        assert_eq!(err, RpcError::Reverted(RevertReason::Unauthorized));
        assert!(!err.is_retriable());
    }

    #[test]
    fn transport_errors_are_retriable() {
        assert!(RpcError::Timeout.is_retriable());
        assert!(RpcError::Transport("reset".into()).is_retriable());
    }
}
