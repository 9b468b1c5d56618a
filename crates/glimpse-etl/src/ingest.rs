//! The ingestion run: catalog → fetch → embed → record → flush.
//!
//! A run moves through `Init → ModelLoading → Streaming →
//! {Fetch → Embed → Record}* → Flush → Done`. Records are handled one at a
//! time; the embedding client is never called concurrently. Per-record
//! fetch and embed failures are logged and counted, never fatal.

use std::fmt;
use std::io::Read;

use glimpse_core::model::{CatalogRecord, Dataset, IndexEntry, Vector};

use crate::catalog::CatalogReader;
use crate::checkpoint::Checkpointer;
use crate::embed::EmbeddingClient;
use crate::error::{EmbedError, IngestError, IngestResult};
use crate::fetch::AssetFetcher;

/// States of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestPhase {
    Init,
    ModelLoading,
    Streaming,
    Fetch,
    Embed,
    Record,
    Flush,
    Done,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::ModelLoading => "model-loading",
            Self::Streaming => "streaming",
            Self::Fetch => "fetch",
            Self::Embed => "embed",
            Self::Record => "record",
            Self::Flush => "flush",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Running totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records that went through fetch/embed in this run.
    pub processed: usize,
    /// Records whose embedding was recorded.
    pub embedded: usize,
    /// Records skipped because they were already durably stored.
    pub skipped_existing: usize,
    /// Catalog rows skipped as malformed or duplicate.
    pub skipped_rows: usize,
    /// Records whose fetch or embed failed.
    pub failed: usize,
    /// Checkpoint flushes, including the final one.
    pub flushes: usize,
}

/// Advisory progress snapshot handed to a progress callback.
#[derive(Debug, Clone)]
pub struct IngestProgress<'a> {
    pub phase: IngestPhase,
    pub stats: IngestStats,
    pub record: Option<&'a CatalogRecord>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub stats: IngestStats,
    /// Entries in the persisted dataset after the final flush.
    pub total_entries: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries stored ({} embedded, {} already done, {} failed, {} bad rows, {} flushes)",
            self.total_entries,
            self.stats.embedded,
            self.stats.skipped_existing,
            self.stats.failed,
            self.stats.skipped_rows,
            self.stats.flushes
        )
    }
}

/// Callback receiving progress snapshots. Purely cosmetic.
pub type ProgressFn<'a> = Box<dyn Fn(&IngestProgress<'_>) + Send + Sync + 'a>;

/// Pipeline-local accumulation state.
#[derive(Debug)]
struct IngestState {
    dataset: Dataset,
    stats: IngestStats,
}

/// Orchestrates one ingestion run over an already-loaded embedding client.
pub struct IngestionPipeline<'a> {
    client: &'a dyn EmbeddingClient,
    fetcher: &'a dyn AssetFetcher,
    checkpointer: Checkpointer,
    progress: Option<ProgressFn<'a>>,
}

impl fmt::Debug for IngestionPipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("client", &self.client)
            .field("fetcher", &self.fetcher)
            .field("checkpointer", &self.checkpointer)
            .finish_non_exhaustive()
    }
}

impl<'a> IngestionPipeline<'a> {
    #[must_use]
    pub fn new(
        client: &'a dyn EmbeddingClient,
        fetcher: &'a dyn AssetFetcher,
        checkpointer: Checkpointer,
    ) -> Self {
        Self {
            client,
            fetcher,
            checkpointer,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn enter(&self, phase: IngestPhase, stats: IngestStats, record: Option<&CatalogRecord>) {
        log::trace!("ingest phase: {phase}");
        if let Some(progress) = &self.progress {
            progress(&IngestProgress {
                phase,
                stats,
                record,
            });
        }
    }

    /// Run to completion over `catalog`.
    ///
    /// # Errors
    /// Fatal conditions only: the client's dimension disagrees with the
    /// store (`ModelInit`), the existing store cannot be loaded (`Store`),
    /// a checkpoint cannot be written (`Checkpoint`), or the catalog stops
    /// being readable partway through (`CatalogRead`, raised after the
    /// records read so far have been flushed).
    pub async fn run<R: Read + Send>(
        mut self,
        mut catalog: CatalogReader<R>,
    ) -> IngestResult<IngestReport> {
        let mut state = IngestState {
            dataset: Dataset::new(self.checkpointer.store().dimension()),
            stats: IngestStats::default(),
        };

        self.enter(IngestPhase::Init, state.stats, None);
        let expected = self.checkpointer.store().dimension();

        self.enter(IngestPhase::ModelLoading, state.stats, None);
        if self.client.dimension() != expected {
            return Err(IngestError::ModelInit(EmbedError::Dimension {
                expected,
                actual: self.client.dimension(),
            }));
        }

        self.enter(IngestPhase::Streaming, state.stats, None);
        state.dataset = self.checkpointer.resume()?;

        for record in &mut catalog {
            if self.checkpointer.is_done(&state.dataset, &record) {
                state.stats.skipped_existing += 1;
                log::debug!("Already indexed: {}", record.id);
                continue;
            }

            state.stats.processed += 1;
            match self.process(&record, state.stats).await {
                Ok(vector) => {
                    self.enter(IngestPhase::Record, state.stats, Some(&record));
                    state.dataset.insert(IndexEntry::new(record, vector))?;
                    state.stats.embedded += 1;
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("Skipping {}: {}", record.id, e);
                    state.stats.failed += 1;
                }
                Err(e) => return Err(e),
            }

            if self.checkpointer.record_processed(&state.dataset)? {
                state.stats.flushes += 1;
                self.enter(IngestPhase::Flush, state.stats, None);
            }
            if state.stats.processed % 100 == 0 {
                log::info!(
                    "Computed embeddings: {} processed, {} failed",
                    state.stats.processed,
                    state.stats.failed
                );
            }
        }
        state.stats.skipped_rows = catalog.skipped_rows();

        self.enter(IngestPhase::Flush, state.stats, None);
        self.checkpointer.finish(&state.dataset)?;
        state.stats.flushes += 1;

        if let Some(e) = catalog.take_error() {
            return Err(e);
        }

        let report = IngestReport {
            stats: state.stats,
            total_entries: state.dataset.len(),
        };
        self.enter(IngestPhase::Done, state.stats, None);
        log::info!("Ingestion complete: {report}");
        Ok(report)
    }

    /// Fetch and embed one record.
    async fn process(&self, record: &CatalogRecord, stats: IngestStats) -> IngestResult<Vector> {
        self.enter(IngestPhase::Fetch, stats, Some(record));
        let bytes = self
            .fetcher
            .fetch(record)
            .await
            .map_err(|source| IngestError::Fetch {
                id: record.id.clone(),
                source,
            })?;

        self.enter(IngestPhase::Embed, stats, Some(record));
        let embed_err = |source: EmbedError| IngestError::Embed {
            id: record.id.clone(),
            source,
        };
        let vector = self.client.embed_image(&bytes).await.map_err(embed_err)?;

        if vector.dimension() != self.client.dimension() {
            return Err(embed_err(EmbedError::Dimension {
                expected: self.client.dimension(),
                actual: vector.dimension(),
            }));
        }
        if !vector.is_unit() {
            return Err(embed_err(EmbedError::Response(format!(
                "embedding is not unit length (norm {})",
                vector.norm()
            ))));
        }
        Ok(vector)
    }
}
