use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use sla_ledger::{AnchorContract, ContractConfig};
use sla_store::FileLock;
use sla_types::{AccountId, Clock, SystemClock};

pub const LEDGER_FILE: &str = "ledger.json";

/// Local ledger persisted as a contract snapshot.
///
/// Every state-changing command takes [`lock`](Self::lock), loads the
/// snapshot, runs one transaction and writes the snapshot back before
/// releasing it. Commands running side by side against the same file are
/// serialized, so none of them overwrites another's transaction.
pub struct LedgerFile {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl LedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exclusive lock on `<path>.lock`, held until the guard is dropped.
    pub fn lock(&self) -> anyhow::Result<FileLock> {
        let path = FileLock::sidecar(&self.path);
        FileLock::exclusive(&path).with_context(|| format!("locking ledger {}", path.display()))
    }

    /// Deploy a fresh contract with `admin` holding both roles.
    pub fn deploy(
        &self,
        admin: AccountId,
        config: ContractConfig,
        force: bool,
    ) -> anyhow::Result<AnchorContract> {
        let _lock = self.lock()?;
        if self.path.exists() && !force {
            bail!(
                "ledger already exists at {} (use --force to replace it)",
                self.path.display()
            );
        }
        let contract = AnchorContract::deploy(admin, config, self.clock.clone());
        self.save(&contract)?;
        Ok(contract)
    }

    pub fn load(&self) -> anyhow::Result<AnchorContract> {
        let json = std::fs::read_to_string(&self.path).with_context(|| {
            format!(
                "no ledger at {} (run `sla deploy` first)",
                self.path.display()
            )
        })?;
        AnchorContract::restore_json(&json, self.clock.clone())
            .with_context(|| format!("loading ledger {}", self.path.display()))
    }

    pub fn save(&self, contract: &AnchorContract) -> anyhow::Result<()> {
        let json = contract.snapshot_json()?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("writing ledger {}", self.path.display()))?;
        Ok(())
    }
}
