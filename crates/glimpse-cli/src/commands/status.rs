use anyhow::{Context, Result};
use glimpse_etl::Config;

pub fn show_status(config: &Config) -> Result<()> {
    let store = config.dataset_store();

    println!("\n📊 Glimpse Status\n");
    println!("  Data directory: {}", config.data_dir.display());
    println!("  Layout: {}", store.layout());
    println!("  Vectors: {}", store.vectors_path().display());
    println!("  Metadata: {}", store.metadata_path().display());

    if !store.exists() {
        println!("\n  No embeddings stored yet.");
        println!("\n  Run `glimpse ingest` to index {}", config.catalog_path.display());
        return Ok(());
    }

    let dataset = store.load().context("Failed to load the stored embeddings")?;
    println!("  Embeddings: {} (dimension {})", dataset.len(), dataset.dimension());

    if let Some(cache) = &config.asset_cache_dir {
        let cached = std::fs::read_dir(cache).map(Iterator::count).unwrap_or(0);
        println!("  Cached images: {} in {}", cached, cache.display());
    }

    Ok(())
}
