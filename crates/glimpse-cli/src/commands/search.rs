use anyhow::{Context, Result};
use glimpse_etl::{Config, EmbeddingClient, HttpEmbeddingClient};
use glimpse_search::{QueryEngine, QueryTemplate};

pub async fn run_search(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    raw: bool,
    shards: usize,
) -> Result<()> {
    let engine = QueryEngine::open(&config.dataset_store())
        .context("Failed to load the stored embeddings")?;
    if engine.is_empty() {
        println!("No embeddings stored yet. Run `glimpse ingest` first.");
        return Ok(());
    }

    let template = if raw {
        QueryTemplate::identity()
    } else {
        QueryTemplate::new(config.query_template.clone())?
    };
    let query_text = template.render(text);

    let client = HttpEmbeddingClient::connect(&config.embedding_endpoint, config.request_timeout())
        .await
        .context("Failed to load the embedding model")?;
    let query = client
        .embed_text(&query_text)
        .await
        .with_context(|| format!("Failed to embed query '{query_text}'"))?;

    let top_k = top_k.unwrap_or(config.top_k);
    let hits = engine.search_sharded(&query, top_k, shards)?;

    println!("\n🔎 \"{}\" ({} of {} photos)\n", query_text, hits.len(), engine.len());
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "  {:>3}. {:.4}  {}  {}",
            rank + 1,
            hit.similarity,
            hit.id,
            hit.display_url(&config.thumbnail_query)
        );
    }

    Ok(())
}
