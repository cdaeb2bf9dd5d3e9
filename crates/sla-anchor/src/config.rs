use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::DEFAULT_IPFS_GATEWAY;
use crate::retry::RetryPolicy;

/// Anchor client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorClientConfig {
    /// Gateway prefix `ipfs://` references are rewritten through.
    pub ipfs_gateway: String,
    /// Bound on every individual ledger call and fetch.
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Smallest ledger version assigned to a list's first anchor. Should
    /// match the contract's floor.
    pub version_floor: u64,
}

impl Default for AnchorClientConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            request_timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            version_floor: 1,
        }
    }
}

impl AnchorClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
