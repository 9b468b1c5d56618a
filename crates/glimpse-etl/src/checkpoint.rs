//! Checkpointing: periodic durable flushes and resume detection.
//!
//! What counts as "already done" is derived only from what is on disk: a
//! record is done when its id is in the persisted dataset and, if an asset
//! cache is configured, its image is in the cache. A crash therefore loses
//! at most the records processed since the last flush.

use std::path::PathBuf;

use glimpse_core::model::{CatalogRecord, Dataset};
use glimpse_core::store::DatasetStore;

use crate::error::{IngestError, IngestResult};
use crate::fetch::cached_asset_path;

#[derive(Debug)]
pub struct Checkpointer {
    store: DatasetStore,
    every: usize,
    asset_cache: Option<PathBuf>,
    since_flush: usize,
    flushes: usize,
}

impl Checkpointer {
    /// Flush every `every` processed records.
    ///
    /// # Errors
    /// Returns [`IngestError::Config`] if `every` is zero.
    pub fn new(store: DatasetStore, every: usize) -> IngestResult<Self> {
        if every == 0 {
            return Err(IngestError::Config(
                "checkpoint cadence must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            every,
            asset_cache: None,
            since_flush: 0,
            flushes: 0,
        })
    }

    /// Also require the cached image to exist before treating a record as done.
    #[must_use]
    pub fn with_asset_cache(mut self, dir: Option<PathBuf>) -> Self {
        self.asset_cache = dir;
        self
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn every(&self) -> usize {
        self.every
    }

    /// Number of flushes performed so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Load the durable state to resume from.
    pub fn resume(&self) -> IngestResult<Dataset> {
        let dataset = self.store.load()?;
        if !dataset.is_empty() {
            log::info!(
                "Resuming with {} embeddings already stored",
                dataset.len()
            );
        }
        Ok(dataset)
    }

    /// Whether `record` can be skipped in this run.
    pub fn is_done(&self, dataset: &Dataset, record: &CatalogRecord) -> bool {
        dataset.contains(&record.id)
            && self
                .asset_cache
                .as_deref()
                .is_none_or(|dir| cached_asset_path(dir, &record.id).exists())
    }

    /// Count one processed record, flushing on every `every`-th.
    ///
    /// Returns `true` if a flush happened.
    pub fn record_processed(&mut self, dataset: &Dataset) -> IngestResult<bool> {
        self.since_flush += 1;
        if self.since_flush >= self.every {
            self.flush(dataset)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Final, unconditional flush at the end of a run.
    pub fn finish(&mut self, dataset: &Dataset) -> IngestResult<()> {
        self.flush(dataset)
    }

    fn flush(&mut self, dataset: &Dataset) -> IngestResult<()> {
        self.store.save(dataset).map_err(IngestError::Checkpoint)?;
        self.since_flush = 0;
        self.flushes += 1;
        log::info!("Saved {} embeddings and photo IDs", dataset.len());
        Ok(())
    }
}
