//! Model artifact fetchers
//!
//! A fetcher resolves a model URL to a file on local disk. The loader only
//! sees the [`ModelFetcher`] trait, so the default download path can be
//! swapped for a custom one (bundled assets, a test double, a closure).

use async_trait::async_trait;
use charid_core::{Error, Result};
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Resolves a model URL to a local file path
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PathBuf>;
}

/// Default directory for downloaded models
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache/charid/models")
}

/// Map a URL to its location inside a cache directory.
///
/// `https://host/a/b/model.safetensors?x=1` becomes `<cache>/host/a/b/model.safetensors`.
pub fn cache_path_for(cache_dir: &Path, url: &str) -> Result<PathBuf> {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let without_query = without_scheme
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or_default();

    let segments: Vec<String> = without_query
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(|s| {
            s.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();

    // Need at least a host and a file name
    if segments.len() < 2 {
        return Err(Error::fetch(format!("URL has no file name: {}", url)));
    }

    Ok(segments
        .iter()
        .fold(cache_dir.to_path_buf(), |path, segment| path.join(segment)))
}

/// `<dest>.part`, keeping the original extension so files differing only in
/// extension never share a temporary file
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Downloads models over HTTP(S) into a cache directory.
///
/// A file already present in the cache is returned without touching the network.
pub struct HttpFetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
}

impl HttpFetcher {
    /// Create a fetcher caching into `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Apply a request timeout to downloads
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Downloading model from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::fetch(format!("Failed to download {}: {}", url, e)))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write next to the destination and rename so a partial download is never cached
        let partial = partial_path(dest);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(Error::fetch(format!(
                        "Failed to read body of {}: {}",
                        url, e
                    )));
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, dest).await?;

        info!("Model saved to {} ({} bytes)", dest.display(), written);
        Ok(())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(default_cache_dir())
    }
}

#[async_trait]
impl ModelFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let dest = cache_path_for(&self.cache_dir, url)?;

        if tokio::fs::try_exists(&dest).await? {
            debug!("Using cached model at {}", dest.display());
            return Ok(dest);
        }

        self.download(url, &dest).await?;
        Ok(dest)
    }
}

/// Resolves `file://` URLs and plain paths
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

#[async_trait]
impl ModelFetcher for LocalFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));

        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::fetch(format!(
                "Model file not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }
}

/// Location of a file in a Hugging Face Hub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubLocation {
    pub repo_id: String,
    pub revision: String,
    pub filename: String,
}

impl HubLocation {
    /// Parse `hf://owner/repo[@revision]/path/to/file`
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("hf://")
            .ok_or_else(|| Error::fetch(format!("Not a Hugging Face URL: {}", url)))?;

        let mut parts = rest.splitn(3, '/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next().unwrap_or_default();
        let filename = parts.next().unwrap_or_default();

        let (repo, revision) = match repo.split_once('@') {
            Some((name, rev)) => (name, rev),
            None => (repo, "main"),
        };

        if owner.is_empty() || repo.is_empty() || revision.is_empty() || filename.is_empty() {
            return Err(Error::fetch(format!(
                "Expected hf://owner/repo[@revision]/file, got {}",
                url
            )));
        }

        Ok(Self {
            repo_id: format!("{}/{}", owner, repo),
            revision: revision.to_string(),
            filename: filename.to_string(),
        })
    }
}

/// Downloads model files from the Hugging Face Hub into the hub cache
#[cfg(feature = "hf-hub")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HfHubFetcher;

#[cfg(feature = "hf-hub")]
#[async_trait]
impl ModelFetcher for HfHubFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let location = HubLocation::parse(url)?;
        info!(
            "Downloading {} from HuggingFace: {} @ {}",
            location.filename, location.repo_id, location.revision
        );

        // hf-hub's sync API blocks on network I/O
        tokio::task::spawn_blocking(move || {
            let api = hf_hub::api::sync::Api::new().map_err(|e| {
                Error::fetch(format!("Failed to initialize HuggingFace API: {}", e))
            })?;

            let repo = api.repo(hf_hub::Repo::with_revision(
                location.repo_id.clone(),
                hf_hub::RepoType::Model,
                location.revision.clone(),
            ));

            repo.get(&location.filename).map_err(|e| {
                Error::fetch(format!(
                    "Failed to download {} from {}: {}",
                    location.filename, location.repo_id, e
                ))
            })
        })
        .await
        .map_err(|e| Error::fetch(format!("HuggingFace download task failed: {}", e)))?
    }
}

/// Dispatches on the URL scheme: `http(s)://`, `hf://`, otherwise a local path
pub struct DefaultFetcher {
    http: HttpFetcher,
    local: LocalFetcher,
}

impl DefaultFetcher {
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            local: LocalFetcher,
        }
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new(HttpFetcher::default())
    }
}

#[async_trait]
impl ModelFetcher for DefaultFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.http.fetch(url).await;
        }

        if url.starts_with("hf://") {
            #[cfg(feature = "hf-hub")]
            {
                return HfHubFetcher.fetch(url).await;
            }

            #[cfg(not(feature = "hf-hub"))]
            {
                return Err(Error::fetch(
                    "hf:// URLs require the 'hf-hub' feature",
                ));
            }
        }

        self.local.fetch(url).await
    }
}

/// Adapts an async closure `Fn(String) -> Future<Output = Result<PathBuf>>` into a fetcher
pub struct FnFetcher<F> {
    f: F,
}

impl<F> FnFetcher<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ModelFetcher for FnFetcher<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PathBuf>> + Send + 'static,
{
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        (self.f)(url.to_string()).await
    }
}
