//! Ingestion pipeline for glimpse.
//!
//! Streams a photo catalog, fetches each image, embeds it with a CLIP
//! service, and checkpoints the growing dataset to disk. The whole run is
//! exposed as a treadle `Stage` so the CLI can drive it as a workflow.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod pipeline;
pub mod stage;
pub mod work_item;

pub use catalog::{CatalogFormat, CatalogReader, CatalogSource};
pub use checkpoint::Checkpointer;
pub use config::Config;
pub use embed::{EmbeddingClient, HttpEmbeddingClient};
pub use error::{EmbedError, FetchError, IngestError, IngestResult};
pub use fetch::{AssetFetcher, HttpAssetFetcher};
pub use ingest::{IngestPhase, IngestProgress, IngestReport, IngestStats, IngestionPipeline};
pub use pipeline::{build_pipeline, run_job};
pub use stage::IngestStage;
pub use work_item::CatalogJob;
