//! Error types for the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by an [`EmbeddingClient`](crate::embed::EmbeddingClient).
#[derive(Debug, Error)]
pub enum EmbedError {
    /// An HTTP request to the embedding service failed.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with something other than an embedding.
    #[error("unexpected response: {0}")]
    Response(String),

    /// The embedding has the wrong number of components.
    #[error("expected {expected} components, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// The raw embedding could not be turned into a unit vector.
    #[error("invalid embedding: {0}")]
    Vector(#[from] glimpse_core::Error),
}

/// Errors raised by an [`AssetFetcher`](crate::fetch::AssetFetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The download failed (after retries, for transient failures).
    #[error("download failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The asset cache could not be read or written.
    #[error("asset cache error: {0}")]
    Cache(#[from] std::io::Error),
}

impl FetchError {
    /// Returns `true` when retrying the download may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            Self::Cache(_) => false,
        }
    }
}

/// Errors that can occur during an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The catalog file is missing, unreadable, or lacks required columns.
    #[error("cannot read catalog {}: {message}", path.display())]
    CatalogRead { path: PathBuf, message: String },

    /// The embedding model could not be loaded or disagrees with the
    /// configured dimension.
    #[error("model initialization failed: {0}")]
    ModelInit(#[source] EmbedError),

    /// The asset for one catalog record could not be obtained.
    #[error("fetch failed for {id}: {source}")]
    Fetch { id: String, source: FetchError },

    /// The asset for one catalog record could not be embedded.
    #[error("embedding failed for {id}: {source}")]
    Embed { id: String, source: EmbedError },

    /// A checkpoint flush failed; durability can no longer be guaranteed.
    #[error("checkpoint write failed: {0}")]
    Checkpoint(#[source] glimpse_core::Error),

    /// An error propagated from the store layer.
    #[error("store error: {0}")]
    Store(#[from] glimpse_core::Error),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IngestError {
    /// Returns `true` for per-item failures: the record is skipped and the
    /// run continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Embed { .. })
    }
}

/// Convenience alias for ingestion results.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_item_errors_are_recoverable() {
        let embed = IngestError::Embed {
            id: "p1".to_string(),
            source: EmbedError::Response("empty body".to_string()),
        };
        assert!(embed.is_recoverable());
        assert!(embed.to_string().contains("p1"));

        let fetch = IngestError::Fetch {
            id: "p2".to_string(),
            source: FetchError::Cache(std::io::Error::other("disk full")),
        };
        assert!(fetch.is_recoverable());
    }

    #[test]
    fn test_run_level_errors_are_fatal() {
        let catalog = IngestError::CatalogRead {
            path: PathBuf::from("/missing.tsv"),
            message: "not found".to_string(),
        };
        assert!(!catalog.is_recoverable());
        assert!(catalog.to_string().contains("/missing.tsv"));

        let checkpoint = IngestError::Checkpoint(glimpse_core::Error::InvalidData(
            "read-only".to_string(),
        ));
        assert!(!checkpoint.is_recoverable());
        assert!(!IngestError::ModelInit(EmbedError::Response("down".to_string())).is_recoverable());
    }

    #[test]
    fn test_cache_errors_are_not_transient() {
        let err = FetchError::Cache(std::io::Error::other("denied"));
        assert!(!err.is_transient());
    }
}
