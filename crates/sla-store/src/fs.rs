use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sla_statuslist::{DocumentVersion, StatusListDocument};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::filelock::FileLock;
use crate::names::validate_list_name;
use crate::traits::{check_forward, check_swap, DocumentStore};

/// Subdirectory of the root holding one JSON file per list.
pub const LISTS_DIR: &str = "statuslists";

/// Filesystem document store.
///
/// Layout: `<root>/statuslists/<list>.json`, each file the full document
/// (including `hash`) as pretty-printed JSON. Files are written to a
/// temporary file in the same directory and renamed into place, so readers
/// never observe a partial document.
///
/// Check-and-set holds an exclusive OS lock on `<root>/statuslists/<list>.lock`
/// from load to rename, so any number of handles and processes may share a
/// root.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(LISTS_DIR))?;
        debug!(root = %root.display(), "opened filesystem document store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the JSON file holding `list`.
    pub fn path_for(&self, list: &str) -> PathBuf {
        self.root.join(LISTS_DIR).join(format!("{list}.json"))
    }

    /// Path of the lock file serializing writers of `list`.
    pub fn lock_path_for(&self, list: &str) -> PathBuf {
        self.root.join(LISTS_DIR).join(format!("{list}.lock"))
    }

    fn lock_list(&self, list: &str) -> StoreResult<FileLock> {
        Ok(FileLock::exclusive(self.lock_path_for(list))?)
    }

    fn load(&self, list: &str) -> StoreResult<Option<StatusListDocument>> {
        let path = self.path_for(list);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| {
            warn!(list, %reason, "stored status list failed integrity check");
            StoreError::Corrupt {
                list: list.to_string(),
                reason,
            }
        };

        let doc: StatusListDocument =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        doc.bitset().map_err(|e| corrupt(e.to_string()))?;
        let computed = doc.compute_hash().map_err(|e| corrupt(e.to_string()))?;
        if computed != doc.hash {
            return Err(corrupt(format!(
                "hash mismatch: recorded {}, computed {}",
                doc.hash, computed
            )));
        }
        Ok(Some(doc))
    }

    fn store(&self, list: &str, doc: &StatusListDocument) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let path = self.path_for(list);
        let dir = self.root.join(LISTS_DIR);

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(list, version = %doc.version, hash = %doc.hash.short_hex(), "stored status list");
        Ok(())
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, list: &str) -> StoreResult<Option<StatusListDocument>> {
        validate_list_name(list)?;
        self.load(list)
    }

    fn create(&self, list: &str, doc: &StatusListDocument) -> StoreResult<()> {
        validate_list_name(list)?;
        let _lock = self.lock_list(list)?;
        if self.path_for(list).exists() {
            return Err(StoreError::AlreadyExists(list.to_string()));
        }
        self.store(list, doc)
    }

    fn write(&self, list: &str, doc: &StatusListDocument) -> StoreResult<()> {
        validate_list_name(list)?;
        let _lock = self.lock_list(list)?;
        let current = self.load(list)?;
        check_forward(list, current.as_ref(), doc)?;
        self.store(list, doc)
    }

    fn replace(
        &self,
        list: &str,
        expected: &DocumentVersion,
        doc: &StatusListDocument,
    ) -> StoreResult<()> {
        validate_list_name(list)?;
        let _lock = self.lock_list(list)?;
        let current = self.load(list)?;
        check_swap(list, current.as_ref(), expected, doc)?;
        self.store(list, doc)
    }

    fn list_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.root.join(LISTS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_list_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
