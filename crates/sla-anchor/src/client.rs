use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sla_ledger::AnchorRecord;
use sla_statuslist::{DocumentVersion, StatusListDocument};
use sla_store::{DocumentStore, StoreError};
use sla_types::{AccountId, Digest, ListId};
use tracing::{debug, info, warn};

use crate::config::AnchorClientConfig;
use crate::error::{AnchorError, AnchorResult};
use crate::fetch::{DocumentFetcher, FetchError, HttpFetcher};
use crate::index::{IndexEntry, VersionIndex};
use crate::retry::{with_retry, Exhausted};
use crate::rpc::{AnchorSubmission, LedgerRpc, RevertReason, RpcError, TxReceipt};

/// How an anchor request ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AnchorStatus {
    /// A new transaction was accepted.
    Submitted { receipt: TxReceipt },
    /// The ledger already held exactly this tuple, from an earlier call or
    /// from an attempt whose receipt was lost.
    AlreadyAnchored,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorOutcome {
    pub submission: AnchorSubmission,
    pub document_version: DocumentVersion,
    #[serde(flatten)]
    pub status: AnchorStatus,
}

/// Result of comparing a published document with its anchor.
///
/// `ok == false` means the fetched bytes do not hash to the anchored digest:
/// the document was tampered with, or is newer or older than the anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub ok: bool,
    pub list_id: ListId,
    pub uri: String,
    pub on_chain_hash: String,
    pub local_hash: String,
    pub version: u64,
    #[serde(with = "sla_types::temporal::canonical")]
    pub updated_at: DateTime<Utc>,
    pub updater: AccountId,
}

/// Bridge between status list documents and the anchor ledger.
///
/// Stateless apart from the [`VersionIndex`], which maps document versions
/// to ledger versions injectively and monotonically per list.
pub struct AnchorClient {
    rpc: Arc<dyn LedgerRpc>,
    fetcher: Arc<dyn DocumentFetcher>,
    index: Arc<dyn VersionIndex>,
    config: AnchorClientConfig,
}

impl AnchorClient {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        fetcher: Arc<dyn DocumentFetcher>,
        index: Arc<dyn VersionIndex>,
        config: AnchorClientConfig,
    ) -> Self {
        Self {
            rpc,
            fetcher,
            index,
            config,
        }
    }

    /// Client fetching over HTTP(S), IPFS gateway and local files, per `config`.
    pub fn with_http_fetcher(
        rpc: Arc<dyn LedgerRpc>,
        index: Arc<dyn VersionIndex>,
        config: AnchorClientConfig,
    ) -> AnchorResult<Self> {
        let fetcher = HttpFetcher::new(config.ipfs_gateway.clone(), config.request_timeout())
            .map_err(|source| AnchorError::Fetch {
                uri: config.ipfs_gateway.clone(),
                source,
            })?;
        Ok(Self::new(rpc, Arc::new(fetcher), index, config))
    }

    pub fn config(&self) -> &AnchorClientConfig {
        &self.config
    }

    /// Anchor `doc` at its own URI (`doc.id`).
    pub async fn anchor(&self, list_id: ListId, doc: &StatusListDocument) -> AnchorResult<AnchorOutcome> {
        self.anchor_at(list_id, &doc.id, doc).await
    }

    /// Anchor the current document of `list` in `store`.
    pub async fn anchor_list(
        &self,
        store: &dyn DocumentStore,
        list: &str,
        list_id: ListId,
    ) -> AnchorResult<AnchorOutcome> {
        let doc = store
            .read(list)?
            .ok_or_else(|| StoreError::NotFound(list.to_string()))?;
        self.anchor(list_id, &doc).await
    }

    /// Anchor `doc` with an explicit published location.
    pub async fn anchor_at(
        &self,
        list_id: ListId,
        uri: &str,
        doc: &StatusListDocument,
    ) -> AnchorResult<AnchorOutcome> {
        let computed = doc.compute_hash()?;
        if computed != doc.hash {
            warn!(list_id = %list_id.short_id(), "refusing to anchor document with stale hash");
            return Err(AnchorError::DocumentIntegrity {
                list_id,
                recorded: doc.hash,
                computed,
            });
        }

        let on_ledger = self.call_ledger(&list_id).await?;
        let version = self.project_version(&list_id, doc, on_ledger.as_ref())?;
        let submission = AnchorSubmission {
            list_id,
            uri: uri.to_string(),
            hash: doc.hash,
            version,
        };
        let outcome = |status| AnchorOutcome {
            submission: submission.clone(),
            document_version: doc.version.clone(),
            status,
        };

        if on_ledger.as_ref().is_some_and(|r| submission.matches(r)) {
            info!(list_id = %list_id.short_id(), version, "already anchored");
            return Ok(outcome(AnchorStatus::AlreadyAnchored));
        }

        let timeout = self.config.request_timeout();
        let result = with_retry(&self.config.retry, "anchor submit", RpcError::is_retriable, || {
            let submission = &submission;
            async move {
                tokio::time::timeout(timeout, self.rpc.submit(submission))
                    .await
                    .map_err(|_| RpcError::Timeout)?
            }
        })
        .await;

        match result {
            Ok(receipt) => {
                info!(
                    list_id = %list_id.short_id(),
                    version,
                    document_version = %doc.version,
                    block = receipt.block,
                    "anchor submitted"
                );
                Ok(outcome(AnchorStatus::Submitted { receipt }))
            }
            Err(failed)
                if matches!(
                    failed.error,
                    RpcError::Reverted(RevertReason::VersionMustIncrease { .. })
                ) =>
            {
                // An earlier attempt may have landed without us seeing the receipt.
                let record = self.call_ledger(&list_id).await?;
                if record.as_ref().is_some_and(|r| submission.matches(r)) {
                    info!(list_id = %list_id.short_id(), version, "anchor already applied by earlier attempt");
                    return Ok(outcome(AnchorStatus::AlreadyAnchored));
                }
                Err(rpc_failure("anchor submit", list_id, failed))
            }
            Err(failed) => Err(rpc_failure("anchor submit", list_id, failed)),
        }
    }

    /// Compare the published document with its anchor.
    pub async fn verify(&self, list_id: &ListId) -> AnchorResult<VerifyReport> {
        let record = self
            .call_ledger(list_id)
            .await?
            .ok_or(AnchorError::NotFound(*list_id))?;

        let bytes = self.fetch(&record.uri).await?;
        let local = Digest::of(&bytes);
        let on_chain_hash = record.hash.to_prefixed_hex();
        let local_hash = local.to_prefixed_hex();
        let ok = Digest::hex_eq(&on_chain_hash, &local_hash);

        if ok {
            info!(list_id = %list_id.short_id(), version = record.version, "verified");
        } else {
            warn!(
                list_id = %list_id.short_id(),
                uri = %record.uri,
                on_chain = %record.hash.short_hex(),
                local = %local.short_hex(),
                "published document does not match anchor"
            );
        }

        Ok(VerifyReport {
            ok,
            list_id: *list_id,
            uri: record.uri,
            on_chain_hash,
            local_hash,
            version: record.version,
            updated_at: record.updated_at,
            updater: record.updater,
        })
    }

    /// Digest of whatever is published at `uri`.
    pub async fn hash_uri(&self, uri: &str) -> AnchorResult<Digest> {
        Ok(Digest::of(&self.fetch(uri).await?))
    }

    /// Ledger version to submit for `doc`.
    ///
    /// The same document version always maps to the same ledger version. A
    /// newer document version gets one past the highest of the indexed and
    /// on-ledger versions. The entry is persisted before returning.
    fn project_version(
        &self,
        list_id: &ListId,
        doc: &StatusListDocument,
        on_ledger: Option<&AnchorRecord>,
    ) -> AnchorResult<u64> {
        let indexed = self.index.get(list_id)?;
        if let Some(entry) = &indexed {
            if entry.document_version == doc.version {
                if entry.hash != doc.hash {
                    return Err(AnchorError::DocumentIntegrity {
                        list_id: *list_id,
                        recorded: entry.hash,
                        computed: doc.hash,
                    });
                }
                debug!(list_id = %list_id.short_id(), version = entry.ledger_version, "reusing indexed ledger version");
                return Ok(entry.ledger_version);
            }
            if doc.version < entry.document_version {
                return Err(AnchorError::VersionRegression {
                    list_id: *list_id,
                    anchored: entry.document_version.to_string(),
                    attempted: doc.version.to_string(),
                });
            }
        }

        let last = indexed
            .map_or(0, |e| e.ledger_version)
            .max(on_ledger.map_or(0, |r| r.version));
        let next = last.saturating_add(1).max(self.config.version_floor);
        self.index.put(
            list_id,
            &IndexEntry {
                document_version: doc.version.clone(),
                ledger_version: next,
                hash: doc.hash,
            },
        )?;
        debug!(list_id = %list_id.short_id(), version = next, document_version = %doc.version, "assigned ledger version");
        Ok(next)
    }

    async fn call_ledger(&self, list_id: &ListId) -> AnchorResult<Option<AnchorRecord>> {
        let timeout = self.config.request_timeout();
        with_retry(&self.config.retry, "ledger call", RpcError::is_retriable, || async move {
            tokio::time::timeout(timeout, self.rpc.call(list_id))
                .await
                .map_err(|_| RpcError::Timeout)?
        })
        .await
        .map_err(|failed| rpc_failure("ledger call", *list_id, failed))
    }

    async fn fetch(&self, uri: &str) -> AnchorResult<Vec<u8>> {
        let timeout = self.config.request_timeout();
        with_retry(&self.config.retry, "fetch", FetchError::is_retriable, || async move {
            tokio::time::timeout(timeout, self.fetcher.fetch(uri))
                .await
                .map_err(|_| FetchError::Timeout)?
        })
        .await
        .map_err(|failed| {
            if failed.error.is_retriable() {
                AnchorError::NetworkFailure {
                    operation: format!("fetch {uri}"),
                    attempts: failed.attempts,
                    reason: failed.error.to_string(),
                }
            } else {
                AnchorError::Fetch {
                    uri: uri.to_string(),
                    source: failed.error,
                }
            }
        })
    }
}

fn rpc_failure(operation: &str, list_id: ListId, failed: Exhausted<RpcError>) -> AnchorError {
    match failed.error {
        RpcError::Reverted(RevertReason::Unauthorized) => AnchorError::Unauthorized {
            list_id,
            reason: RevertReason::Unauthorized.to_string(),
        },
        RpcError::Reverted(RevertReason::VersionMustIncrease { current, attempted }) => {
            AnchorError::VersionMustIncrease {
                list_id,
                current,
                attempted,
            }
        }
        RpcError::Reverted(RevertReason::Other(reason)) => AnchorError::Rejected { list_id, reason },
        other => AnchorError::NetworkFailure {
            operation: operation.to_string(),
            attempts: failed.attempts,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use sla_ledger::{AnchorContract, ContractConfig};
    use sla_store::{InMemoryDocumentStore, PublisherConfig, StatusListService};
    use sla_types::{FixedClock, StatusPurpose};

    use crate::fetch::MemoryFetcher;
    use crate::index::InMemoryVersionIndex;
    use crate::retry::RetryPolicy;
    use crate::rpc::LocalLedgerRpc;

    struct Harness {
        contract: Arc<AnchorContract>,
        fetcher: Arc<MemoryFetcher>,
        index: Arc<InMemoryVersionIndex>,
        service: StatusListService,
        clock: Arc<FixedClock>,
        admin: AccountId,
    }

    impl Harness {
        fn new() -> Self {
            let clock = Arc::new(FixedClock::at_millis(1_736_935_200_000));
            let admin = AccountId::new("0xadmin").unwrap();
            let contract = Arc::new(AnchorContract::deploy(
                admin.clone(),
                ContractConfig::default(),
                clock.clone(),
            ));
            let service = StatusListService::new(
                Arc::new(InMemoryDocumentStore::new()),
                clock.clone(),
                PublisherConfig {
                    base_url: "https://status.example.org/status".into(),
                    ..Default::default()
                },
            );
            Self {
                contract,
                fetcher: Arc::new(MemoryFetcher::new()),
                index: Arc::new(InMemoryVersionIndex::new()),
                service,
                clock,
                admin,
            }
        }

        fn client_with(&self, rpc: Arc<dyn LedgerRpc>) -> AnchorClient {
            AnchorClient::new(
                rpc,
                self.fetcher.clone(),
                self.index.clone(),
                AnchorClientConfig {
                    request_timeout_ms: 1_000,
                    retry: RetryPolicy {
                        max_attempts: 3,
                        base_delay_ms: 1,
                        max_delay_ms: 2,
                    },
                    ..Default::default()
                },
            )
        }

        fn client(&self) -> AnchorClient {
            self.client_with(Arc::new(self.local_rpc(&self.admin)))
        }

        fn local_rpc(&self, account: &AccountId) -> LocalLedgerRpc {
            LocalLedgerRpc::new(self.contract.clone(), account.clone())
        }

        fn publish(&self, list: &str) {
            let doc = self.service.read(list).unwrap();
            self.fetcher
                .insert(doc.id.clone(), self.service.published_payload(list).unwrap());
        }
    }

    /// Wraps a ledger and injects transport faults.
    struct FaultyRpc {
        inner: LocalLedgerRpc,
        /// Submissions that fail before reaching the ledger.
        fail_before: AtomicU32,
        /// Submissions that reach the ledger but whose response is lost.
        lose_receipts: AtomicU32,
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[async_trait]
    impl LedgerRpc for FaultyRpc {
        async fn call(&self, list_id: &ListId) -> Result<Option<AnchorRecord>, RpcError> {
            self.inner.call(list_id).await
        }

        async fn submit(&self, submission: &AnchorSubmission) -> Result<TxReceipt, RpcError> {
            if take(&self.fail_before) {
                return Err(RpcError::Transport("connection reset".into()));
            }
            let receipt = self.inner.submit(submission).await?;
            if take(&self.lose_receipts) {
                return Err(RpcError::Timeout);
            }
            Ok(receipt)
        }
    }

    #[tokio::test]
    async fn end_to_end_verify_detects_tampering() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        h.service.init("main", StatusPurpose::Revocation, Some(16384)).unwrap();
        let doc = h.service.update("main", 42, true).unwrap();
        h.publish("main");

        let client = h.client();
        let outcome = client.anchor(list_id, &doc).await.unwrap();
        assert!(matches!(outcome.status, AnchorStatus::Submitted { .. }));
        assert_eq!(outcome.submission.version, 1);
        assert_eq!(outcome.submission.hash, doc.hash);
        assert_eq!(outcome.submission.uri, doc.id);

        let report = client.verify(&list_id).await.unwrap();
        assert!(report.ok);
        assert_eq!(report.on_chain_hash, report.local_hash);
        assert_eq!(report.version, 1);
        assert_eq!(report.updater, h.admin);
        assert_eq!(report.uri, doc.id);

        let mut tampered = h.service.published_payload("main").unwrap();
        let last = tampered.len() - 3;
        tampered[last] ^= 0x01;
        h.fetcher.insert(doc.id.clone(), tampered);

        let report = client.verify(&list_id).await.unwrap();
        assert!(!report.ok);
        assert_ne!(report.on_chain_hash, report.local_hash);
        assert_eq!(report.on_chain_hash, doc.hash.to_prefixed_hex());
    }

    #[tokio::test]
    async fn verify_report_serializes_camel_case() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(8)).unwrap();
        h.publish("main");
        let client = h.client();
        client.anchor(list_id, &doc).await.unwrap();

        let json = serde_json::to_value(client.verify(&list_id).await.unwrap()).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["listId"], list_id.to_hex());
        assert!(json["onChainHash"].as_str().unwrap().starts_with("0x"));
        assert_eq!(json["updatedAt"], "2025-01-15T10:00:00.000Z");
    }

    #[tokio::test]
    async fn stale_published_document_fails_verification() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        h.publish("main");
        let newer = h.service.update("main", 1, true).unwrap();

        let client = h.client();
        client.anchor(list_id, &newer).await.unwrap();
        assert!(!client.verify(&list_id).await.unwrap().ok);
        h.publish("main");
        assert!(client.verify(&list_id).await.unwrap().ok);
    }

    #[tokio::test]
    async fn reanchoring_same_document_is_idempotent() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let client = h.client();

        client.anchor(list_id, &doc).await.unwrap();
        let height = h.contract.block_height();
        let again = client.anchor(list_id, &doc).await.unwrap();
        assert_eq!(again.status, AnchorStatus::AlreadyAnchored);
        assert_eq!(again.submission.version, 1);
        assert_eq!(h.contract.block_height(), height);
    }

    #[tokio::test]
    async fn newer_documents_get_increasing_ledger_versions() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let client = h.client();

        let mut last = 0;
        for i in 0..5 {
            h.clock.advance(chrono::Duration::milliseconds(10));
            let doc = h.service.update("main", i, true).unwrap();
            let outcome = client.anchor(list_id, &doc).await.unwrap();
            assert!(outcome.submission.version > last);
            last = outcome.submission.version;
        }
        assert_eq!(last, 5);
        assert_eq!(h.contract.history(&list_id).len(), 5);
    }

    #[tokio::test]
    async fn older_document_is_a_regression() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        let old = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let new = h.service.update("main", 1, true).unwrap();
        let client = h.client();

        client.anchor(list_id, &new).await.unwrap();
        assert!(matches!(
            client.anchor(list_id, &old).await,
            Err(AnchorError::VersionRegression { .. })
        ));
    }

    #[tokio::test]
    async fn ledger_ahead_of_index_is_skipped_past() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        h.contract
            .anchor(&h.admin, list_id, "https://elsewhere/x.json", Digest::of(b"x"), 5)
            .unwrap();
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();

        let outcome = h.client().anchor(list_id, &doc).await.unwrap();
        assert_eq!(outcome.submission.version, 6);
    }

    #[tokio::test]
    async fn document_with_wrong_hash_is_refused() {
        let h = Harness::new();
        let mut doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        doc.issuer = "did:example:mallory".into();
        assert!(matches!(
            h.client().anchor(ListId::derive("main"), &doc).await,
            Err(AnchorError::DocumentIntegrity { .. })
        ));
        assert!(h.contract.get(&ListId::derive("main")).is_none());
    }

    #[tokio::test]
    async fn unauthorized_is_terminal() {
        let h = Harness::new();
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let stranger = AccountId::new("0xstranger").unwrap();
        let client = h.client_with(Arc::new(h.local_rpc(&stranger)));
        assert!(matches!(
            client.anchor(ListId::derive("main"), &doc).await,
            Err(AnchorError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn transient_submit_failures_are_retried() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let rpc = Arc::new(FaultyRpc {
            inner: h.local_rpc(&h.admin),
            fail_before: AtomicU32::new(2),
            lose_receipts: AtomicU32::new(0),
        });
        let outcome = h.client_with(rpc).anchor(list_id, &doc).await.unwrap();
        assert!(matches!(outcome.status, AnchorStatus::Submitted { .. }));
        assert_eq!(h.contract.get(&list_id).unwrap().hash, doc.hash);
    }

    #[tokio::test]
    async fn lost_receipt_is_reported_as_already_anchored() {
        let h = Harness::new();
        let list_id = ListId::derive("main");
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let rpc = Arc::new(FaultyRpc {
            inner: h.local_rpc(&h.admin),
            fail_before: AtomicU32::new(0),
            lose_receipts: AtomicU32::new(1),
        });
        let outcome = h.client_with(rpc).anchor(list_id, &doc).await.unwrap();
        assert_eq!(outcome.status, AnchorStatus::AlreadyAnchored);
        assert_eq!(h.contract.history(&list_id).len(), 1);
    }

    #[tokio::test]
    async fn persistent_transport_failure_surfaces_after_bounded_attempts() {
        let h = Harness::new();
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let rpc = Arc::new(FaultyRpc {
            inner: h.local_rpc(&h.admin),
            fail_before: AtomicU32::new(u32::MAX),
            lose_receipts: AtomicU32::new(0),
        });
        match h.client_with(rpc).anchor(ListId::derive("main"), &doc).await {
            Err(AnchorError::NetworkFailure { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected {other:?}"),
        }
        // The ledger version was reserved before submission and is reused.
        let outcome = h.client().anchor(ListId::derive("main"), &doc).await.unwrap();
        assert_eq!(outcome.submission.version, 1);
    }

    #[tokio::test]
    async fn verify_errors_are_distinguished() {
        let h = Harness::new();
        let client = h.client();
        let list_id = ListId::derive("main");
        assert!(matches!(client.verify(&list_id).await, Err(AnchorError::NotFound(_))));

        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        client.anchor(list_id, &doc).await.unwrap();
        // Nothing published at the URI.
        assert!(matches!(client.verify(&list_id).await, Err(AnchorError::Fetch { .. })));
    }

    #[tokio::test]
    async fn anchor_list_reads_from_store() {
        let h = Harness::new();
        h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        let doc = h.service.update("main", 9, true).unwrap();
        let client = h.client();

        let outcome = client
            .anchor_list(h.service.store().as_ref(), "main", ListId::derive("main"))
            .await
            .unwrap();
        assert_eq!(outcome.submission.hash, doc.hash);
        assert!(matches!(
            client
                .anchor_list(h.service.store().as_ref(), "missing", ListId::derive("missing"))
                .await,
            Err(AnchorError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn hash_uri_matches_document_hash() {
        let h = Harness::new();
        let doc = h.service.init("main", StatusPurpose::Revocation, Some(64)).unwrap();
        h.publish("main");
        assert_eq!(h.client().hash_uri(&doc.id).await.unwrap(), doc.hash);
    }
}
