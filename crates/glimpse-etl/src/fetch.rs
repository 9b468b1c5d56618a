//! Asset fetching: obtains the raw image bytes for a catalog record.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use glimpse_core::model::{append_query, CatalogRecord};
use reqwest::Client;

use crate::error::FetchError;

const USER_AGENT: &str = "glimpse/0.1.0 (https://github.com/oxur/glimpse)";

/// Location of a record's cached image inside `cache_dir`.
#[must_use]
pub fn cached_asset_path(cache_dir: &Path, id: &str) -> PathBuf {
    cache_dir.join(format!("{id}.jpg"))
}

/// Publish `bytes` at `path` via a sibling `.part` file and a rename, so
/// `path` only ever holds a complete image.
async fn write_cached(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, path).await
}

/// Source of raw media bytes for catalog records.
#[async_trait]
pub trait AssetFetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, record: &CatalogRecord) -> Result<Vec<u8>, FetchError>;
}

/// Downloads images over HTTP, optionally keeping a local copy.
///
/// Transient failures (timeouts, connection errors, 5xx, 429) are retried
/// with exponential backoff. With a cache directory, an image already on
/// disk is read instead of downloaded.
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    http: Client,
    image_query: String,
    cache_dir: Option<PathBuf>,
    retries: usize,
    min_delay: Duration,
}

impl HttpAssetFetcher {
    /// Create a new fetcher.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            image_query: String::new(),
            cache_dir: None,
            retries: 3,
            min_delay: Duration::from_millis(500),
        })
    }

    /// Query appended to every source URL (e.g. resize parameters).
    #[must_use]
    pub fn with_image_query(mut self, query: impl Into<String>) -> Self {
        self.image_query = query.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: usize, min_delay: Duration) -> Self {
        self.retries = retries;
        self.min_delay = min_delay;
        self
    }

    /// The URL actually requested for `record`.
    pub fn asset_url(&self, record: &CatalogRecord) -> String {
        append_query(&record.source_url, &self.image_query)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, record: &CatalogRecord) -> Result<Vec<u8>, FetchError> {
        let cached = self
            .cache_dir
            .as_deref()
            .map(|dir| cached_asset_path(dir, &record.id));
        if let Some(path) = cached.as_deref() {
            if tokio::fs::try_exists(path).await? {
                log::debug!("Using cached {}", path.display());
                return Ok(tokio::fs::read(path).await?);
            }
        }

        let url = self.asset_url(record);
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_times(self.retries);
        let bytes = (|| self.download(&url))
            .retry(backoff)
            .when(FetchError::is_transient)
            .notify(|err: &FetchError, delay: Duration| {
                log::debug!("Retrying {} in {:?}: {}", url, delay, err);
            })
            .await?;

        if let Some(path) = cached.as_deref() {
            write_cached(path, &bytes).await?;
        }

        Ok(bytes)
    }
}
