use std::collections::HashMap;
use std::sync::RwLock;

use sla_statuslist::{DocumentVersion, StatusListDocument};

use crate::error::{StoreError, StoreResult};
use crate::names::validate_list_name;
use crate::traits::{check_forward, check_swap, DocumentStore};

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. Documents are cloned on read/write.
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<String, StatusListDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of lists currently stored.
    pub fn len(&self) -> usize {
        self.docs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn read(&self, list: &str) -> StoreResult<Option<StatusListDocument>> {
        validate_list_name(list)?;
        Ok(self.docs.read().expect("lock poisoned").get(list).cloned())
    }

    fn create(&self, list: &str, doc: &StatusListDocument) -> StoreResult<()> {
        validate_list_name(list)?;
        let mut docs = self.docs.write().expect("lock poisoned");
        if docs.contains_key(list) {
            return Err(StoreError::AlreadyExists(list.to_string()));
        }
        docs.insert(list.to_string(), doc.clone());
        Ok(())
    }

    fn write(&self, list: &str, doc: &StatusListDocument) -> StoreResult<()> {
        validate_list_name(list)?;
        let mut docs = self.docs.write().expect("lock poisoned");
        check_forward(list, docs.get(list), doc)?;
        docs.insert(list.to_string(), doc.clone());
        Ok(())
    }

    fn replace(
        &self,
        list: &str,
        expected: &DocumentVersion,
        doc: &StatusListDocument,
    ) -> StoreResult<()> {
        validate_list_name(list)?;
        let mut docs = self.docs.write().expect("lock poisoned");
        check_swap(list, docs.get(list), expected, doc)?;
        docs.insert(list.to_string(), doc.clone());
        Ok(())
    }

    fn list_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .docs
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}
