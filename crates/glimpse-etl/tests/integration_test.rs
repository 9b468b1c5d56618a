//! Integration tests for the ingest pipeline.
//!
//! A deterministic fake embedder and an in-memory fetcher stand in for the
//! CLIP service and the image host, so runs are reproducible and offline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use glimpse_core::model::{CatalogRecord, StoreLayout, Vector};
use glimpse_core::store::DatasetStore;
use glimpse_etl::{
    build_pipeline, run_job, AssetFetcher, CatalogJob, CatalogSource, Checkpointer, Config,
    EmbedError, EmbeddingClient, FetchError, IngestStage, IngestionPipeline,
};
use tempfile::TempDir;
use treadle::{StateStore, WorkItem};

const DIM: usize = 8;

#[derive(Debug)]
struct HashEmbedder;

#[async_trait]
impl EmbeddingClient for HashEmbedder {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed_image(&self, bytes: &[u8]) -> Result<Vector, EmbedError> {
        let mut values = vec![1.0f32; DIM];
        for (i, b) in bytes.iter().enumerate() {
            values[(i * 7 + usize::from(*b)) % DIM] += f32::from(*b) / 255.0;
        }
        Ok(Vector::normalize(values)?)
    }

    async fn embed_text(&self, text: &str) -> Result<Vector, EmbedError> {
        self.embed_image(text.as_bytes()).await
    }
}

/// Serves the record URL as image bytes. After `stall_after` fetches it
/// never answers again, simulating a process that is killed mid-run.
#[derive(Debug)]
struct UrlFetcher {
    calls: AtomicUsize,
    stall_after: Option<usize>,
}

impl UrlFetcher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            stall_after: None,
        }
    }

    fn stalling_after(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            stall_after: Some(n),
        }
    }
}

#[async_trait]
impl AssetFetcher for UrlFetcher {
    async fn fetch(&self, record: &CatalogRecord) -> Result<Vec<u8>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_after.is_some_and(|n| call >= n) {
            std::future::pending::<()>().await;
        }
        Ok(record.source_url.as_bytes().to_vec())
    }
}

fn write_catalog(dir: &Path, n: usize) -> PathBuf {
    let mut data = "photo_id\tphoto_url\tphoto_image_url\n".to_string();
    for i in 0..n {
        data.push_str(&format!(
            "photo{i:03}\thttps://unsplash.com/photos/photo{i:03}\thttps://images.unsplash.com/photo-{i:03}\n"
        ));
    }
    let path = dir.join("photos.tsv000");
    std::fs::write(&path, data).unwrap();
    path
}

async fn ingest(
    data_dir: &Path,
    catalog: &Path,
    layout: StoreLayout,
    fetcher: &UrlFetcher,
) -> glimpse_etl::IngestResult<glimpse_etl::IngestReport> {
    let checkpointer = Checkpointer::new(DatasetStore::in_dir(data_dir, layout, DIM), 3)?;
    let reader = CatalogSource::default().read(catalog)?;
    IngestionPipeline::new(&HashEmbedder, fetcher, checkpointer)
        .run(reader)
        .await
}

fn load(data_dir: &Path, layout: StoreLayout) -> HashMap<String, (String, Vec<f32>)> {
    DatasetStore::in_dir(data_dir, layout, DIM)
        .load()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e.id().to_string(),
                (e.url().to_string(), e.vector.as_slice().to_vec()),
            )
        })
        .collect()
}

async fn assert_resumable(layout: StoreLayout) {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path(), 10);
    let interrupted_dir = temp_dir.path().join("interrupted");
    let clean_dir = temp_dir.path().join("clean");

    // Killed during the 8th fetch: flushes happened after records 3 and 6.
    let stalled = tokio::time::timeout(
        Duration::from_secs(2),
        ingest(&interrupted_dir, &catalog, layout, &UrlFetcher::stalling_after(7)),
    )
    .await;
    assert!(stalled.is_err(), "run should have been interrupted");
    assert_eq!(load(&interrupted_dir, layout).len(), 6);

    let resumed = ingest(&interrupted_dir, &catalog, layout, &UrlFetcher::new())
        .await
        .unwrap();
    assert_eq!(resumed.stats.skipped_existing, 6);
    assert_eq!(resumed.stats.processed, 4);

    ingest(&clean_dir, &catalog, layout, &UrlFetcher::new())
        .await
        .unwrap();

    assert_eq!(load(&interrupted_dir, layout), load(&clean_dir, layout));
}

#[tokio::test]
async fn test_interrupted_keyed_run_resumes() {
    assert_resumable(StoreLayout::Keyed).await;
}

#[tokio::test]
async fn test_interrupted_positional_run_resumes() {
    assert_resumable(StoreLayout::Positional).await;
}

#[tokio::test]
async fn test_stored_entries_are_unique_and_normalized() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path(), 12);
    let data_dir = temp_dir.path().join("data");

    // Ingest twice over the same catalog.
    for _ in 0..2 {
        ingest(&data_dir, &catalog, StoreLayout::Positional, &UrlFetcher::new())
            .await
            .unwrap();
    }

    let dataset = DatasetStore::in_dir(&data_dir, StoreLayout::Positional, DIM)
        .load()
        .unwrap();
    assert_eq!(dataset.len(), 12);
    for entry in &dataset {
        assert_eq!(entry.vector.dimension(), DIM);
        assert!((entry.vector.norm() - 1.0).abs() < 1e-4);
    }
}

fn stage(data_dir: &Path, catalog: &Path) -> IngestStage {
    let config = Config {
        catalog_path: catalog.to_path_buf(),
        data_dir: data_dir.to_path_buf(),
        dimension: DIM,
        checkpoint_every: 4,
        ..Config::default()
    };
    IngestStage::new(config, Arc::new(HashEmbedder), Arc::new(UrlFetcher::new()))
}

#[test]
fn test_pipeline_construction() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path(), 1);

    let result = build_pipeline(stage(&temp_dir.path().join("data"), &catalog));

    assert!(result.is_ok(), "Pipeline should build successfully");
}

#[test]
fn test_pipeline_rejects_invalid_config() {
    let config = Config {
        checkpoint_every: 0,
        ..Config::default()
    };
    let stage = IngestStage::new(config, Arc::new(HashEmbedder), Arc::new(UrlFetcher::new()));

    assert!(build_pipeline(stage).is_err());
}

#[tokio::test]
async fn test_workflow_runs_ingest_stage() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path(), 5);
    let data_dir = temp_dir.path().join("data");

    let stage = stage(&data_dir, &catalog);
    let job = CatalogJob::for_config(stage.config());
    let report = stage.report_handle();
    let workflow = build_pipeline(stage).unwrap();
    let mut store = treadle::SqliteStateStore::open(&temp_dir.path().join("pipeline.db"))
        .await
        .unwrap();

    run_job(&workflow, &job, &mut store).await.unwrap();

    let report = report.lock().unwrap().clone().unwrap();
    assert_eq!(report.total_entries, 5);
    assert_eq!(report.stats.flushes, 2);
    assert_eq!(load(&data_dir, StoreLayout::Positional).len(), 5);
}

#[tokio::test]
async fn test_rerun_reuses_job_and_runs_again() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path(), 5);
    let data_dir = temp_dir.path().join("data");
    let db = temp_dir.path().join("pipeline.db");

    for run in 0..2 {
        let stage = stage(&data_dir, &catalog);
        let job = CatalogJob::for_config(stage.config());
        let report = stage.report_handle();
        let workflow = build_pipeline(stage).unwrap();
        let mut store = treadle::SqliteStateStore::open(&db).await.unwrap();

        run_job(&workflow, &job, &mut store).await.unwrap();

        let report = report.lock().unwrap().clone().unwrap();
        assert_eq!(report.total_entries, 5);
        if run == 1 {
            assert_eq!(report.stats.skipped_existing, 5);
            assert_eq!(report.stats.embedded, 0);
        }
        assert_eq!(store.list_work_items().await.unwrap(), vec![job.id().to_string()]);
    }
}

#[tokio::test]
async fn test_stage_rejects_job_for_other_target() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path(), 2);
    let data_dir = temp_dir.path().join("data");

    let stage = stage(&data_dir, &catalog);
    let report = stage.report_handle();
    let workflow = build_pipeline(stage).unwrap();
    let mut store = treadle::MemoryStateStore::new();

    let other = CatalogJob::new(catalog, StoreLayout::Keyed, data_dir.clone());
    let _ = run_job(&workflow, &other, &mut store).await;

    assert!(report.lock().unwrap().is_none());
    assert!(load(&data_dir, StoreLayout::Positional).is_empty());
}

#[test]
fn test_catalog_job_work_item() {
    let config = Config {
        catalog_path: PathBuf::from("/data/unsplash/photos.tsv000"),
        data_dir: PathBuf::from("/index"),
        ..Config::default()
    };
    let job = CatalogJob::for_config(&config);

    assert!(job.id().starts_with("ingest-"));
    assert_eq!(job.catalog_path, config.catalog_path);
    assert_eq!(job.layout, StoreLayout::Positional);
    assert_eq!(format!("{job}"), "/data/unsplash/photos.tsv000 -> /index (positional)");
}
