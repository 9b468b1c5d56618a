use anyhow::Result;
use glimpse_etl::{config, Config};
use std::path::Path;

/// Show the current effective configuration.
pub fn show_config(config: &Config, config_path: &Path) {
    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config_path.display());

    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  catalog_path: {}", config.catalog_path.display());
    println!(
        "  catalog: delimiter {:?}, id column '{}', url column '{}'",
        config.catalog.delimiter, config.catalog.id_column, config.catalog.url_column
    );
    println!("  data_dir: {}", config.data_dir.display());
    println!("  layout: {}", config.layout);
    println!("  dimension: {}", config.dimension);
    println!("  checkpoint_every: {}", config.checkpoint_every);
    println!("  embedding_endpoint: {}", config.embedding_endpoint);
    println!("  request_timeout_secs: {}", config.request_timeout_secs);
    println!("  image_query: {}", config.image_query);
    println!("  fetch_retries: {}", config.fetch_retries);
    println!(
        "  asset_cache_dir: {}",
        config
            .asset_cache_dir
            .as_deref()
            .map_or_else(|| "<not set>".to_string(), |p| p.display().to_string())
    );
    println!("  query_template: {}", config.query_template);
    println!("  top_k: {}", config.top_k);
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());

    println!("\nPriority: CLI args > ENV vars (GLIMPSE_*) > Config file > Defaults");
}

/// Create the default config file.
pub fn init_config() -> Result<()> {
    let config_path = config::config_file_path();
    if config::ensure_config_file()? {
        println!("✓ Created {}", config_path.display());
    } else {
        println!("Config file already exists: {}", config_path.display());
    }
    Ok(())
}

/// Show the config file path.
pub fn show_path(config_path: &Path) {
    println!("{}", config_path.display());
}
