use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use sla_types::{AccountId, Clock, Digest, ListId};
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::record::{AnchorReceipt, AnchorRecord, LedgerEvent};
use crate::roles::Role;

/// Contract parameters fixed at deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Smallest version accepted for the first anchor of a list.
    pub version_floor: u64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self { version_floor: 1 }
    }
}

/// Serializable image of the full contract state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSnapshot {
    pub config: ContractConfig,
    pub block_height: u64,
    pub records: Vec<AnchorRecord>,
    pub members: BTreeMap<AccountId, BTreeSet<Role>>,
    pub events: Vec<LedgerEvent>,
}

#[derive(Default)]
struct ContractState {
    block_height: u64,
    records: HashMap<ListId, AnchorRecord>,
    members: BTreeMap<AccountId, BTreeSet<Role>>,
    events: Vec<LedgerEvent>,
}

impl ContractState {
    fn has_role(&self, role: Role, account: &AccountId) -> bool {
        self.members
            .get(account)
            .is_some_and(|roles| roles.contains(&role))
    }

    fn require(&self, role: Role, account: &AccountId) -> LedgerResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                account: account.clone(),
                role,
            })
        }
    }

    fn admin_count(&self) -> usize {
        self.members
            .values()
            .filter(|roles| roles.contains(&Role::Admin))
            .count()
    }

    /// Start a new block and return its height.
    fn next_block(&mut self) -> u64 {
        self.block_height += 1;
        self.block_height
    }

    fn grant(&mut self, role: Role, account: &AccountId, sender: &AccountId) -> Option<LedgerEvent> {
        let inserted = self.members.entry(account.clone()).or_default().insert(role);
        if !inserted {
            return None;
        }
        let event = LedgerEvent::RoleGranted {
            role,
            account: account.clone(),
            sender: sender.clone(),
            block: self.block_height,
        };
        self.events.push(event.clone());
        Some(event)
    }

    fn revoke(&mut self, role: Role, account: &AccountId, sender: &AccountId) -> LedgerResult<Option<LedgerEvent>> {
        if !self.has_role(role, account) {
            return Ok(None);
        }
        if role == Role::Admin && self.admin_count() == 1 {
            return Err(LedgerError::LastAdmin(account.clone()));
        }
        if let Some(roles) = self.members.get_mut(account) {
            roles.remove(&role);
            if roles.is_empty() {
                self.members.remove(account);
            }
        }
        let event = LedgerEvent::RoleRevoked {
            role,
            account: account.clone(),
            sender: sender.clone(),
            block: self.next_block(),
        };
        self.events.push(event.clone());
        Ok(Some(event))
    }
}

/// The anchor contract state machine.
///
/// Per list: `absent -> anchored(v1) -> anchored(v2) -> ...` with each
/// version strictly greater than the last. Every transition runs inside one
/// write-lock critical section, so checks always see committed state and a
/// reverted call changes nothing.
pub struct AnchorContract {
    config: ContractConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<ContractState>,
}

impl AnchorContract {
    /// Deploy a contract. `admin` receives both `Admin` and `Anchorer`.
    pub fn deploy(admin: AccountId, config: ContractConfig, clock: Arc<dyn Clock>) -> Self {
        let mut state = ContractState::default();
        state.next_block();
        for role in Role::ALL {
            state.grant(role, &admin, &admin);
        }
        info!(%admin, floor = config.version_floor, "deployed anchor contract");
        Self {
            config,
            clock,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    /// Write `(uri, hash, version)` for `list_id`.
    ///
    /// Checks, in order: caller holds `Anchorer` (`Unauthorized`), version is
    /// at least the floor and greater than the stored version
    /// (`VersionMustIncrease`), `uri` is non-empty (`InvalidInput`).
    pub fn anchor(
        &self,
        caller: &AccountId,
        list_id: ListId,
        uri: &str,
        hash: Digest,
        version: u64,
    ) -> LedgerResult<AnchorReceipt> {
        let mut state = self.state.write().expect("lock poisoned");

        state.require(Role::Anchorer, caller)?;

        let current = state.records.get(&list_id).map(|r| r.version);
        if version < self.config.version_floor || current.is_some_and(|v| version <= v) {
            debug!(list_id = %list_id.short_id(), ?current, attempted = version, "anchor reverted");
            return Err(LedgerError::VersionMustIncrease {
                list_id,
                current,
                attempted: version,
            });
        }

        if uri.trim().is_empty() {
            return Err(LedgerError::InvalidInput("uri must not be empty".into()));
        }

        let block = state.block_height + 1;
        let record = AnchorRecord {
            list_id,
            uri: uri.to_string(),
            hash,
            version,
            updated_at: self.clock.now(),
            updater: caller.clone(),
            block,
        };
        let event = LedgerEvent::StatusListAnchored {
            list_id,
            uri: record.uri.clone(),
            hash,
            version,
            updater: caller.clone(),
            block,
        };
        let tx_hash = tx_hash(block, caller, &event)?;
        state.block_height = block;
        state.records.insert(list_id, record);
        state.events.push(event.clone());

        info!(
            list_id = %list_id.short_id(),
            version,
            hash = %hash.short_hex(),
            block,
            "status list anchored"
        );
        Ok(AnchorReceipt {
            tx_hash,
            block,
            event,
        })
    }

    /// Current anchor of `list_id`. Open to any caller.
    pub fn get(&self, list_id: &ListId) -> Option<AnchorRecord> {
        self.state
            .read()
            .expect("lock poisoned")
            .records
            .get(list_id)
            .cloned()
    }

    pub fn has_role(&self, role: Role, account: &AccountId) -> bool {
        self.state.read().expect("lock poisoned").has_role(role, account)
    }

    /// Accounts holding `role`, sorted.
    pub fn members(&self, role: Role) -> Vec<AccountId> {
        self.state
            .read()
            .expect("lock poisoned")
            .members
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(account, _)| account.clone())
            .collect()
    }

    /// Grant `role` to `account`. Admin only. Returns `None` if the account
    /// already held the role.
    pub fn grant_role(
        &self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> LedgerResult<Option<LedgerEvent>> {
        let mut state = self.state.write().expect("lock poisoned");
        state.require(Role::Admin, caller)?;
        if state.has_role(role, account) {
            return Ok(None);
        }
        state.next_block();
        let event = state.grant(role, account, caller);
        info!(%role, %account, sender = %caller, "role granted");
        Ok(event)
    }

    /// Revoke `role` from `account`. Admin only. The last admin cannot be
    /// revoked.
    pub fn revoke_role(
        &self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> LedgerResult<Option<LedgerEvent>> {
        let mut state = self.state.write().expect("lock poisoned");
        state.require(Role::Admin, caller)?;
        let event = state.revoke(role, account, caller)?;
        if event.is_some() {
            info!(%role, %account, sender = %caller, "role revoked");
        }
        Ok(event)
    }

    /// Drop `role` from the caller's own account.
    pub fn renounce_role(&self, caller: &AccountId, role: Role) -> LedgerResult<Option<LedgerEvent>> {
        let mut state = self.state.write().expect("lock poisoned");
        let event = state.revoke(role, caller, caller)?;
        if event.is_some() {
            info!(%role, account = %caller, "role renounced");
        }
        Ok(event)
    }

    /// Every event emitted so far, oldest first.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.read().expect("lock poisoned").events.clone()
    }

    /// Anchoring events of one list, oldest first.
    pub fn history(&self, list_id: &ListId) -> Vec<LedgerEvent> {
        self.state
            .read()
            .expect("lock poisoned")
            .events
            .iter()
            .filter(|e| e.anchored_list() == Some(list_id))
            .cloned()
            .collect()
    }

    pub fn block_height(&self) -> u64 {
        self.state.read().expect("lock poisoned").block_height
    }

    pub fn snapshot(&self) -> ContractSnapshot {
        let state = self.state.read().expect("lock poisoned");
        let mut records: Vec<AnchorRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.block);
        ContractSnapshot {
            config: self.config.clone(),
            block_height: state.block_height,
            records,
            members: state.members.clone(),
            events: state.events.clone(),
        }
    }

    /// Rebuild a contract from a snapshot.
    pub fn restore(snapshot: ContractSnapshot, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let mut records = HashMap::new();
        for record in snapshot.records {
            if record.block > snapshot.block_height {
                return Err(LedgerError::InvalidInput(format!(
                    "record for {} is ahead of block height {}",
                    record.list_id, snapshot.block_height
                )));
            }
            if records.insert(record.list_id, record).is_some() {
                return Err(LedgerError::InvalidInput("duplicate list record".into()));
            }
        }
        let state = ContractState {
            block_height: snapshot.block_height,
            records,
            members: snapshot.members,
            events: snapshot.events,
        };
        if state.admin_count() == 0 {
            return Err(LedgerError::InvalidInput("snapshot has no admin".into()));
        }
        Ok(Self {
            config: snapshot.config,
            clock,
            state: RwLock::new(state),
        })
    }

    pub fn snapshot_json(&self) -> LedgerResult<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn restore_json(json: &str, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let snapshot: ContractSnapshot =
            serde_json::from_str(json).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Self::restore(snapshot, clock)
    }
}

/// Deterministic transaction hash: BLAKE3 over the block height, sender and
/// the JSON of the emitted event.
fn tx_hash(block: u64, sender: &AccountId, event: &LedgerEvent) -> LedgerResult<Digest> {
    let event_json =
        serde_json::to_vec(event).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"sla-tx-v1:");
    hasher.update(&block.to_le_bytes());
    hasher.update(sender.as_str().as_bytes());
    hasher.update(&event_json);
    Ok(Digest::from_hash(*hasher.finalize().as_bytes()))
}
