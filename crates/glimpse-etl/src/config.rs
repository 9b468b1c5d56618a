use anyhow::{Context, Result};
use confyg::{env, Confygery};
use glimpse_core::model::StoreLayout;
use glimpse_core::store::DatasetStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::CatalogFormat;
use crate::error::{IngestError, IngestResult};

/// Checkpoint cadence used when none is configured.
pub const DEFAULT_CHECKPOINT_EVERY: usize = 500;

/// Embedding dimension of the CLIP ViT-B/16 projection head.
pub const DEFAULT_DIMENSION: usize = 512;

/// Configuration for glimpse.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (GLIMPSE_* prefix)
/// 3. Config file (~/.config/glimpse/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delimited catalog of photos to index.
    ///
    /// Can be set via:
    /// - CLI: glimpse ingest --catalog /path/to/photos.tsv
    /// - ENV: GLIMPSE_CATALOG_PATH
    pub catalog_path: PathBuf,

    /// Column names and delimiter of the catalog file.
    pub catalog: CatalogFormat,

    /// Directory holding the vector file and its metadata sidecar.
    ///
    /// Default: ~/.local/share/glimpse
    pub data_dir: PathBuf,

    /// On-disk layout: "positional" (binary + JSON array) or "keyed" (JSON
    /// objects by id).
    pub layout: StoreLayout,

    /// Number of components per embedding.
    pub dimension: usize,

    /// Flush the dataset after this many processed records.
    pub checkpoint_every: usize,

    /// Base URL of the embedding service.
    pub embedding_endpoint: String,

    /// Per-request timeout for the embedding service and image host.
    pub request_timeout_secs: u64,

    /// Query appended to source image URLs before download.
    pub image_query: String,

    /// Retries for transient download failures.
    pub fetch_retries: usize,

    /// Optional directory where downloaded images are kept as `{id}.jpg`.
    pub asset_cache_dir: Option<PathBuf>,

    /// Template applied to search text before embedding; `{text}` is
    /// replaced by the query.
    pub query_template: String,

    /// Default number of search results.
    pub top_k: usize,

    /// Query appended to result URLs for display.
    pub thumbnail_query: String,

    /// Logger settings (twyg).
    pub logging: twyg::Opts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("unsplash/photos.tsv000"),
            catalog: CatalogFormat::default(),
            data_dir: default_data_dir(),
            layout: StoreLayout::default(),
            dimension: DEFAULT_DIMENSION,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            embedding_endpoint: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 60,
            image_query: "w=1024&h=1024&fit=max&q=90".to_string(),
            fetch_retries: 3,
            asset_cache_dir: None,
            query_template: "photo of {text}".to_string(),
            top_k: 20,
            thumbnail_query: "w=512&h=512&fit=max&q=90".to_string(),
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/glimpse/config.toml
    /// Reads environment variables with GLIMPSE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific file (if it exists) plus the
    /// environment.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("glimpse");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        Ok(config)
    }

    /// Check the settings an ingestion run depends on.
    pub fn validate(&self) -> IngestResult<()> {
        if self.dimension == 0 {
            return Err(IngestError::Config("dimension must be positive".to_string()));
        }
        if self.checkpoint_every == 0 {
            return Err(IngestError::Config(
                "checkpoint_every must be at least 1".to_string(),
            ));
        }
        if self.embedding_endpoint.trim().is_empty() {
            return Err(IngestError::Config(
                "embedding_endpoint is required".to_string(),
            ));
        }
        self.catalog.delimiter_byte()?;
        Ok(())
    }

    /// The dataset store for the configured directory, layout and dimension.
    #[must_use]
    pub fn dataset_store(&self) -> DatasetStore {
        DatasetStore::in_dir(&self.data_dir, self.layout, self.dimension)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Get the default data directory.
///
/// Returns: ~/.local/share/glimpse (or platform equivalent)
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glimpse")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/glimpse/config.toml
/// - macOS: ~/Library/Application Support/glimpse/config.toml
/// - Windows: %APPDATA%\glimpse\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glimpse")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Glimpse Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (GLIMPSE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Photo catalog (tab-separated, with a header row)
catalog_path = "unsplash/photos.tsv000"

# Where embeddings and photo metadata are written
#data_dir = "/path/to/glimpse/data"

# "positional": embeddings.bin + photos.json, entries matched by position
# "keyed":      embeddings.json + photo_index.json, entries matched by id
layout = "positional"

# Embedding size of the model served at embedding_endpoint
dimension = 512

# Save progress after this many photos
checkpoint_every = 500

# CLIP embedding service
embedding_endpoint = "http://127.0.0.1:8000"
request_timeout_secs = 60

# Resize parameters appended to image URLs before download
image_query = "w=1024&h=1024&fit=max&q=90"
fetch_retries = 3

# Keep downloaded images here (and skip re-downloading them)
#asset_cache_dir = "/path/to/images"

# Search
query_template = "photo of {text}"
top_k = 20
thumbnail_query = "w=512&h=512&fit=max&q=90"

[catalog]
delimiter = "\t"
id_column = "photo_id"
url_column = "photo_image_url"

# Logger settings (twyg options)
#[logging]
#level = "debug"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
