use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sla_anchor::AnchorClientConfig;
use sla_ledger::ContractConfig;
use sla_store::PublisherConfig;

pub const CONFIG_FILE: &str = "sla.toml";

/// Contents of `sla.toml`. Every section and field is optional.
///
/// ```toml
/// account = "0xabc"
///
/// [publisher]
/// base_url = "https://issuer.example/status"
///
/// [anchor.retry]
/// max_attempts = 6
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub account: Option<String>,
    pub publisher: PublisherConfig,
    pub anchor: AnchorClientConfig,
    pub contract: ContractConfig,
}

impl CliConfig {
    /// Load `path`. A missing file yields the defaults unless `required`.
    pub fn load(path: &Path, required: bool) -> anyhow::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(Self::default())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading config {}", path.display()))
            }
        };
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
