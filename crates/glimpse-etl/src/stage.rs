//! The ingest stage: runs an [`IngestionPipeline`] inside a treadle workflow.

use std::fmt;
use std::sync::{Arc, Mutex};

use treadle::{Stage, StageContext, StageOutcome};

use crate::catalog::CatalogSource;
use crate::checkpoint::Checkpointer;
use crate::config::Config;
use crate::embed::EmbeddingClient;
use crate::fetch::AssetFetcher;
use crate::ingest::{IngestProgress, IngestReport, IngestionPipeline};
use crate::work_item::CatalogJob;

/// Shared progress callback for the stage.
pub type SharedProgress = Arc<dyn Fn(&IngestProgress<'_>) + Send + Sync>;

/// The Ingest stage: catalog → fetch → embed → checkpointed store.
pub struct IngestStage {
    config: Config,
    client: Arc<dyn EmbeddingClient>,
    fetcher: Arc<dyn AssetFetcher>,
    progress: Option<SharedProgress>,
    report: Arc<Mutex<Option<IngestReport>>>,
}

impl fmt::Debug for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestStage")
            .field("catalog_path", &self.config.catalog_path)
            .field("data_dir", &self.config.data_dir)
            .field("client", &self.client)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

impl IngestStage {
    /// `client` must already be loaded; the stage only uses it.
    #[must_use]
    pub fn new(
        config: Config,
        client: Arc<dyn EmbeddingClient>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        Self {
            config,
            client,
            fetcher,
            progress: None,
            report: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle that receives the report of the last successful run.
    #[must_use]
    pub fn report_handle(&self) -> Arc<Mutex<Option<IngestReport>>> {
        Arc::clone(&self.report)
    }

    fn stage_err(e: impl fmt::Display) -> treadle::TreadleError {
        treadle::TreadleError::StageExecution(e.to_string())
    }

    fn store_report(&self, report: IngestReport) -> treadle::Result<()> {
        let mut slot = self
            .report
            .lock()
            .map_err(|_| Self::stage_err("ingest report lock poisoned"))?;
        *slot = Some(report);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stage for IngestStage {
    fn name(&self) -> &str {
        "ingest"
    }

    async fn execute(
        &self,
        item: &dyn treadle::WorkItem,
        _context: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        let job = CatalogJob::for_config(&self.config);
        if item.id() != treadle::WorkItem::id(&job) {
            return Err(Self::stage_err(format!("work item {} does not target {job}", item.id())));
        }

        log::info!(
            "Starting ingestion of {} into {}",
            self.config.catalog_path.display(),
            self.config.data_dir.display()
        );

        let catalog = CatalogSource::new(self.config.catalog.clone())
            .read(&self.config.catalog_path)
            .map_err(Self::stage_err)?;
        let checkpointer =
            Checkpointer::new(self.config.dataset_store(), self.config.checkpoint_every)
                .map_err(Self::stage_err)?
                .with_asset_cache(self.config.asset_cache_dir.clone());

        let mut pipeline =
            IngestionPipeline::new(self.client.as_ref(), self.fetcher.as_ref(), checkpointer);
        if let Some(progress) = self.progress.clone() {
            pipeline =
                pipeline.with_progress(Box::new(move |p: &IngestProgress<'_>| progress(p)));
        }

        let report = pipeline.run(catalog).await.map_err(Self::stage_err)?;
        self.store_report(report)?;

        Ok(StageOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbedError, FetchError};
    use crate::ingest::IngestStats;
    use async_trait::async_trait;
    use glimpse_core::model::{CatalogRecord, Vector};

    #[derive(Debug)]
    struct Unused;

    #[async_trait]
    impl EmbeddingClient for Unused {
        fn dimension(&self) -> usize {
            2
        }

        async fn embed_image(&self, _image: &[u8]) -> Result<Vector, EmbedError> {
            Err(EmbedError::Response("unused".to_string()))
        }

        async fn embed_text(&self, _text: &str) -> Result<Vector, EmbedError> {
            Err(EmbedError::Response("unused".to_string()))
        }
    }

    #[async_trait]
    impl AssetFetcher for Unused {
        async fn fetch(&self, _record: &CatalogRecord) -> Result<Vec<u8>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn report() -> IngestReport {
        IngestReport {
            total_entries: 3,
            stats: IngestStats::default(),
        }
    }

    #[test]
    fn test_store_report_fills_handle() {
        let stage = IngestStage::new(Config::default(), Arc::new(Unused), Arc::new(Unused));
        stage.store_report(report()).unwrap();
        assert_eq!(stage.report_handle().lock().unwrap().as_ref(), Some(&report()));
    }

    #[test]
    fn test_store_report_fails_on_poisoned_lock() {
        let stage = IngestStage::new(Config::default(), Arc::new(Unused), Arc::new(Unused));
        let handle = stage.report_handle();
        let _ = std::thread::spawn(move || {
            let _guard = handle.lock().unwrap();
            panic!("poison the report lock");
        })
        .join();

        assert!(matches!(
            stage.store_report(report()),
            Err(treadle::TreadleError::StageExecution(_))
        ));
    }
}
