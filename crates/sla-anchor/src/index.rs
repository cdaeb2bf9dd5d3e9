use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use sla_statuslist::DocumentVersion;
use sla_store::FileLock;
use sla_types::{Digest, ListId};

use crate::error::{AnchorError, AnchorResult};

/// Last submission recorded for a list: which document version was mapped
/// to which ledger version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub document_version: DocumentVersion,
    pub ledger_version: u64,
    pub hash: Digest,
}

/// Persistent mapping from document versions to ledger versions.
///
/// Entries are written before a transaction is submitted, so a retry after a
/// crash resubmits the same ledger version for the same document.
pub trait VersionIndex: Send + Sync {
    fn get(&self, list_id: &ListId) -> AnchorResult<Option<IndexEntry>>;
    fn put(&self, list_id: &ListId, entry: &IndexEntry) -> AnchorResult<()>;
}

#[derive(Default)]
pub struct InMemoryVersionIndex {
    entries: RwLock<HashMap<ListId, IndexEntry>>,
}

impl InMemoryVersionIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionIndex for InMemoryVersionIndex {
    fn get(&self, list_id: &ListId) -> AnchorResult<Option<IndexEntry>> {
        Ok(self.entries.read().expect("lock poisoned").get(list_id).cloned())
    }

    fn put(&self, list_id: &ListId, entry: &IndexEntry) -> AnchorResult<()> {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(*list_id, entry.clone());
        Ok(())
    }
}

/// Version index stored as one JSON object in a file, keyed by list id.
/// Rewritten atomically on every `put`, under an exclusive lock on
/// `<path>.lock` shared by every handle and process using the file.
pub struct FsVersionIndex {
    path: PathBuf,
}

impl FsVersionIndex {
    pub fn open(path: impl Into<PathBuf>) -> AnchorResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(index_err)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> AnchorResult<FileLock> {
        FileLock::exclusive(FileLock::sidecar(&self.path)).map_err(index_err)
    }

    fn load(&self) -> AnchorResult<BTreeMap<ListId, IndexEntry>> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AnchorError::Index(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(index_err(e)),
        }
    }

    fn save(&self, entries: &BTreeMap<ListId, IndexEntry>) -> AnchorResult<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| AnchorError::Index(e.to_string()))?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(index_err)?;
        tmp.write_all(&json).map_err(index_err)?;
        tmp.as_file().sync_all().map_err(index_err)?;
        tmp.persist(&self.path).map_err(|e| index_err(e.error))?;
        Ok(())
    }
}

fn index_err(e: io::Error) -> AnchorError {
    AnchorError::Index(e.to_string())
}

impl VersionIndex for FsVersionIndex {
    fn get(&self, list_id: &ListId) -> AnchorResult<Option<IndexEntry>> {
        Ok(self.load()?.remove(list_id))
    }

    fn put(&self, list_id: &ListId, entry: &IndexEntry) -> AnchorResult<()> {
        let _lock = self.lock()?;
        let mut entries = self.load()?;
        entries.insert(*list_id, entry.clone());
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sla_types::{Clock, FixedClock};

    fn entry(ledger_version: u64) -> IndexEntry {
        IndexEntry {
            document_version: DocumentVersion::genesis(FixedClock::at_millis(1_000).now()),
            ledger_version,
            hash: Digest::of(b"doc"),
        }
    }

    #[test]
    fn memory_index_put_get() {
        let index = InMemoryVersionIndex::new();
        let id = ListId::derive("main");
        assert_eq!(index.get(&id).unwrap(), None);
        index.put(&id, &entry(3)).unwrap();
        assert_eq!(index.get(&id).unwrap(), Some(entry(3)));
    }

    #[test]
    fn fs_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/index.json");
        let a = ListId::derive("a");
        let b = ListId::derive("b");
        {
            let index = FsVersionIndex::open(&path).unwrap();
            index.put(&a, &entry(1)).unwrap();
            index.put(&b, &entry(7)).unwrap();
            index.put(&a, &entry(2)).unwrap();
        }
        let index = FsVersionIndex::open(&path).unwrap();
        assert_eq!(index.get(&a).unwrap().unwrap().ledger_version, 2);
        assert_eq!(index.get(&b).unwrap().unwrap().ledger_version, 7);
        assert_eq!(index.get(&ListId::derive("c")).unwrap(), None);
    }

    #[test]
    fn fs_index_handles_sharing_a_file_keep_every_put() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let per_handle = 25u64;
        std::thread::scope(|s| {
            for prefix in ["a", "b"] {
                let path = &path;
                s.spawn(move || {
                    let index = FsVersionIndex::open(path).unwrap();
                    for i in 0..per_handle {
                        index.put(&ListId::derive(&format!("{prefix}{i}")), &entry(i)).unwrap();
                    }
                });
            }
        });

        let index = FsVersionIndex::open(&path).unwrap();
        for prefix in ["a", "b"] {
            for i in 0..per_handle {
                let got = index.get(&ListId::derive(&format!("{prefix}{i}"))).unwrap();
                assert_eq!(got.map(|e| e.ledger_version), Some(i));
            }
        }
        assert!(FileLock::sidecar(&path).is_file());
    }

    #[test]
    fn fs_index_reports_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, b"[1,2").unwrap();
        let index = FsVersionIndex::open(&path).unwrap();
        assert!(matches!(index.get(&ListId::derive("a")), Err(AnchorError::Index(_))));
    }
}
