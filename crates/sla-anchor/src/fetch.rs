use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Default gateway for `ipfs://` references.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unsupported uri: {0}")]
    UnsupportedUri(String),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("no document at {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Transient failures worth retrying: transport errors, timeouts,
    /// rate limiting and server errors.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Where a document URI points after gateway rewriting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedUri {
    Http(String),
    File(PathBuf),
}

/// Resolve a document URI.
///
/// - `http://`, `https://`: fetched as is
/// - `ipfs://<cid>[/path]`: rewritten to `<gateway><cid>[/path]`
/// - `file://<path>` and bare paths: read from the local filesystem
pub fn resolve_uri(uri: &str, gateway: &str) -> Result<ResolvedUri, FetchError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(FetchError::UnsupportedUri(uri.to_string()));
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(ResolvedUri::Http(uri.to_string()));
    }
    if let Some(rest) = uri.strip_prefix("ipfs://") {
        let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
        if rest.is_empty() {
            return Err(FetchError::UnsupportedUri(uri.to_string()));
        }
        return Ok(ResolvedUri::Http(format!(
            "{}/{rest}",
            gateway.trim_end_matches('/')
        )));
    }
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(ResolvedUri::File(PathBuf::from(path)));
    }
    if uri.contains("://") {
        return Err(FetchError::UnsupportedUri(uri.to_string()));
    }
    Ok(ResolvedUri::File(PathBuf::from(uri)))
}

/// Byte source for published documents.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher for HTTP(S), IPFS via gateway, and local files.
pub struct HttpFetcher {
    client: reqwest::Client,
    gateway: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(gateway: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            gateway: gateway.into(),
            timeout,
        })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(map_reqwest)?;
        Ok(body.to_vec())
    }
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        match resolve_uri(uri, &self.gateway)? {
            ResolvedUri::Http(url) => {
                debug!(%url, "fetching document");
                tokio::time::timeout(self.timeout, self.get(&url))
                    .await
                    .map_err(|_| FetchError::Timeout)?
            }
            ResolvedUri::File(path) => match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(FetchError::NotFound(path.display().to_string()))
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}

/// In-memory fetcher keyed by exact URI.
#[derive(Default)]
pub struct MemoryFetcher {
    docs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `bytes` at `uri`, replacing anything already there.
    pub fn insert(&self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.docs
            .write()
            .expect("lock poisoned")
            .insert(uri.into(), bytes);
    }
}

#[async_trait]
impl DocumentFetcher for MemoryFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        self.docs
            .read()
            .expect("lock poisoned")
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn resolves_schemes() {
        let gw = DEFAULT_IPFS_GATEWAY;
        assert_eq!(
            resolve_uri("https://x.org/a.json", gw).unwrap(),
            ResolvedUri::Http("https://x.org/a.json".into())
        );
        assert_eq!(
            resolve_uri("ipfs://bafyabc/list.json", gw).unwrap(),
            ResolvedUri::Http("https://ipfs.io/ipfs/bafyabc/list.json".into())
        );
        assert_eq!(
            resolve_uri("ipfs://ipfs/bafyabc", "http://localhost:8080/ipfs").unwrap(),
            ResolvedUri::Http("http://localhost:8080/ipfs/bafyabc".into())
        );
        assert_eq!(
            resolve_uri("file:///tmp/a.json", gw).unwrap(),
            ResolvedUri::File("/tmp/a.json".into())
        );
        assert_eq!(
            resolve_uri("public/a.json", gw).unwrap(),
            ResolvedUri::File("public/a.json".into())
        );
        assert!(resolve_uri("ftp://x/a", gw).is_err());
        assert!(resolve_uri("ipfs://", gw).is_err());
        assert!(resolve_uri("", gw).is_err());
    }

    #[test]
    fn retriable_classification() {
        assert!(FetchError::Timeout.is_retriable());
        assert!(FetchError::Status { url: "u".into(), status: 503 }.is_retriable());
        assert!(FetchError::Status { url: "u".into(), status: 429 }.is_retriable());
        assert!(!FetchError::Status { url: "u".into(), status: 404 }.is_retriable());
        assert!(!FetchError::NotFound("u".into()).is_retriable());
    }

    #[tokio::test]
    async fn http_fetch_returns_exact_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/main.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"id\":1}".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(DEFAULT_IPFS_GATEWAY, Duration::from_secs(5)).unwrap();
        let bytes = fetcher
            .fetch(&format!("{}/status/main.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"{\"id\":1}");
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(DEFAULT_IPFS_GATEWAY, Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn ipfs_goes_through_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafytest"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pinned".to_vec()))
            .mount(&server)
            .await;

        let gateway = format!("{}/ipfs/", server.uri());
        let fetcher = HttpFetcher::new(gateway, Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.fetch("ipfs://bafytest").await.unwrap(), b"pinned");
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(DEFAULT_IPFS_GATEWAY, Duration::from_millis(50)).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout), "{err:?}");
    }

    #[tokio::test]
    async fn file_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.json");
        std::fs::write(&file, b"local").unwrap();

        let fetcher = HttpFetcher::new(DEFAULT_IPFS_GATEWAY, Duration::from_secs(1)).unwrap();
        assert_eq!(fetcher.fetch(file.to_str().unwrap()).await.unwrap(), b"local");
        assert_eq!(
            fetcher.fetch(&format!("file://{}", file.display())).await.unwrap(),
            b"local"
        );
        assert!(matches!(
            fetcher.fetch(dir.path().join("nope").to_str().unwrap()).await,
            Err(FetchError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn memory_fetcher() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("urn:a", b"x".to_vec());
        assert_eq!(fetcher.fetch("urn:a").await.unwrap(), b"x");
        assert!(fetcher.fetch("urn:b").await.is_err());
    }
}
