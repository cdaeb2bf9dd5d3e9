use std::sync::Arc;

use sla_statuslist::{CredentialSigner, SignedCredential, StatusListDocument};
use sla_types::{Clock, StatusPurpose};
use tracing::{debug, info};

use crate::config::PublisherConfig;
use crate::error::{StoreError, StoreResult};
use crate::locks::KeyedLocks;
use crate::names::validate_list_name;
use crate::traits::DocumentStore;

/// Swaps lost to writers outside this service before `update` gives up.
pub const MAX_UPDATE_ATTEMPTS: u32 = 64;

/// Status list publisher operations over a [`DocumentStore`].
///
/// Every mutation of a list runs read, `apply_update`, then a
/// compare-and-swap `replace`, while holding that list's mutex. Lists never
/// contend with each other. A swap lost to another service or process sharing
/// the store is retried from a fresh read, so an acknowledged update is never
/// overwritten.
pub struct StatusListService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: PublisherConfig,
    locks: KeyedLocks,
}

impl StatusListService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            locks: KeyedLocks::new(),
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn document_uri(&self, list: &str) -> String {
        self.config.document_uri(list)
    }

    /// Create `list` with every bit unset.
    ///
    /// Idempotent: if the list already exists with the same purpose and size
    /// the stored document is returned unchanged. A list cannot be
    /// re-initialized with different parameters; that is `AlreadyExists`.
    pub fn init(
        &self,
        list: &str,
        purpose: StatusPurpose,
        size: Option<usize>,
    ) -> StoreResult<StatusListDocument> {
        validate_list_name(list)?;
        let size = size.unwrap_or(self.config.default_list_size);

        let lock = self.locks.handle(list);
        let _guard = lock.lock().expect("lock poisoned");

        if let Some(existing) = self.store.read(list)? {
            if existing.status_purpose == purpose && existing.size == size {
                debug!(list, "status list already initialized");
                return Ok(existing);
            }
            return Err(StoreError::AlreadyExists(list.to_string()));
        }

        let doc = StatusListDocument::create(
            self.document_uri(list),
            self.config.issuer_did.clone(),
            purpose,
            size,
            self.clock.as_ref(),
        )
        .map_err(StoreError::model(list, "init"))?;
        self.store.create(list, &doc)?;

        info!(list, %purpose, size, version = %doc.version, "initialized status list");
        Ok(doc)
    }

    /// Current document of `list`.
    pub fn read(&self, list: &str) -> StoreResult<StatusListDocument> {
        self.store
            .read(list)?
            .ok_or_else(|| StoreError::NotFound(list.to_string()))
    }

    /// Status bit `index` of `list`.
    pub fn status(&self, list: &str, index: usize) -> StoreResult<bool> {
        self.read(list)?
            .status(index)
            .map_err(StoreError::model(list, "status"))
    }

    /// Set bit `index` of `list` to `value` and persist the new version.
    pub fn update(&self, list: &str, index: usize, value: bool) -> StoreResult<StatusListDocument> {
        validate_list_name(list)?;
        let lock = self.locks.handle(list);
        let _guard = lock.lock().expect("lock poisoned");

        let mut attempt = 1;
        let next = loop {
            let current = self.read(list)?;
            let next = current
                .apply_update(index, value, self.clock.as_ref())
                .map_err(StoreError::model(list, "update"))?;
            match self.store.replace(list, &current.version, &next) {
                Ok(()) => break next,
                // Another handle on the same store won the swap.
                Err(StoreError::StaleWrite { stored, .. }) if attempt < MAX_UPDATE_ATTEMPTS => {
                    debug!(list, attempt, %stored, "lost compare-and-swap, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            list,
            index,
            value,
            version = %next.version,
            hash = %next.hash.short_hex(),
            "updated status list"
        );
        Ok(next)
    }

    /// Bytes to publish at the document URI. Their BLAKE2b-256 digest equals the
    /// document hash.
    pub fn published_payload(&self, list: &str) -> StoreResult<Vec<u8>> {
        self.read(list)?
            .canonical_bytes()
            .map_err(StoreError::model(list, "publish"))
    }

    /// Signed StatusList2021 credential for `list`.
    pub fn credential(
        &self,
        list: &str,
        signer: &dyn CredentialSigner,
    ) -> StoreResult<SignedCredential> {
        let doc = self.read(list)?;
        let unsigned = doc.to_credential(self.config.credential_uri(list));
        signer
            .sign_credential(unsigned)
            .map_err(StoreError::model(list, "credential"))
    }
}
