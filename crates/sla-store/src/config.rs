use serde::{Deserialize, Serialize};

/// Publisher settings, passed explicitly to [`StatusListService`](crate::StatusListService).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Base URL lists are published under; list `main` is served at
    /// `<base_url>/main.json` and its credential at `<base_url>/vc/main.json`.
    pub base_url: String,
    /// DID recorded as `issuer` in every document and credential.
    pub issuer_did: String,
    /// Key identifier placed in the JWS header of credential proofs.
    pub signing_kid: String,
    /// Capacity used by `init` when none is given.
    pub default_list_size: usize,
    /// List used by commands that take no list name.
    pub default_list: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3002/status".to_string(),
            issuer_did: "did:example:issuer".to_string(),
            signing_kid: "did:example:issuer#key-1".to_string(),
            default_list_size: 16384,
            default_list: "main".to_string(),
        }
    }
}

impl PublisherConfig {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Stable URI a list is published at. Becomes the document `id`.
    pub fn document_uri(&self, list: &str) -> String {
        format!("{}/{list}.json", self.base())
    }

    /// Identifier of the list's credential.
    pub fn credential_uri(&self, list: &str) -> String {
        format!("{}/vc/{list}.json", self.base())
    }
}
