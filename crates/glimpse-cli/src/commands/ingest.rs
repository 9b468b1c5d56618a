use anyhow::{Context, Result};
use glimpse_etl::{
    build_pipeline, run_job, CatalogJob, Config, EmbeddingClient, HttpAssetFetcher,
    HttpEmbeddingClient, IngestPhase, IngestProgress, IngestStage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {pos} photos {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner().with_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub async fn run_ingest(config: Config) -> Result<()> {
    config.validate()?;
    log::info!("Starting ingestion of {}", config.catalog_path.display());

    // Model loading happens once, before the workflow starts.
    let client = HttpEmbeddingClient::connect(&config.embedding_endpoint, config.request_timeout())
        .await
        .context("Failed to load the embedding model")?;
    println!("  Model: {} (dimension {})", client.model(), client.dimension());

    let fetcher = HttpAssetFetcher::new(config.request_timeout())
        .context("Failed to create HTTP client")?
        .with_image_query(config.image_query.clone())
        .with_cache_dir(config.asset_cache_dir.clone())
        .with_retries(config.fetch_retries, Duration::from_millis(500));

    let bar = progress_bar();
    let observer = bar.clone();
    let stage = IngestStage::new(config.clone(), Arc::new(client), Arc::new(fetcher)).with_progress(
        Arc::new(move |p: &IngestProgress<'_>| {
            observer.set_position(p.stats.processed as u64);
            match p.phase {
                IngestPhase::Fetch => {
                    if let Some(record) = p.record {
                        observer.set_message(format!("({} failed) {}", p.stats.failed, record.id));
                    }
                }
                IngestPhase::Flush => observer.set_message("saving..."),
                _ => {}
            }
        }),
    );
    let report = stage.report_handle();

    let workflow = build_pipeline(stage)?;

    std::fs::create_dir_all(&config.data_dir).context("Failed to create data directory")?;
    let state_path = config.data_dir.join("pipeline.db");
    let mut store = treadle::SqliteStateStore::open(&state_path).await?;

    let job = CatalogJob::for_config(&config);

    let mut events = workflow.subscribe();
    let event_bar = bar.clone();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                treadle::WorkflowEvent::StageStarted { stage, .. } => {
                    event_bar.println(format!("  ⏳ [{stage}] Starting..."));
                }
                treadle::WorkflowEvent::StageCompleted { stage, .. } => {
                    event_bar.println(format!("  ✓ [{stage}] Complete"));
                }
                treadle::WorkflowEvent::StageFailed { stage, error, .. } => {
                    event_bar.println(format!("  ✗ [{stage}] FAILED: {error}"));
                }
                _ => {}
            }
        }
    });

    run_job(&workflow, &job, &mut store).await?;
    bar.finish_and_clear();

    let report = report
        .lock()
        .map_err(|_| anyhow::anyhow!("ingest report lock poisoned"))?
        .clone();
    let Some(report) = report else {
        anyhow::bail!("Ingestion did not complete; see the log for the failing step");
    };

    let stats = report.stats;
    println!("\n✓ Ingestion complete");
    println!("  Stored embeddings: {}", report.total_entries);
    println!("  Embedded this run: {}", stats.embedded);
    println!("  Already indexed:   {}", stats.skipped_existing);
    println!("  Failed:            {}", stats.failed);
    println!("  Bad catalog rows:  {}", stats.skipped_rows);
    println!("  Checkpoints:       {}", stats.flushes);
    Ok(())
}
