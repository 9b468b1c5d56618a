use anyhow::{Context, Result};
use clap::Parser;
use glimpse_core::model::StoreLayout;
use glimpse_etl::{config, Config};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "glimpse", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/glimpse/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding embeddings and photo metadata
    /// (default: ~/.local/share/glimpse)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Embed every photo of a catalog into the index
    ///
    /// Reads the catalog (tab-separated, with a header row), downloads each
    /// photo, sends it to the CLIP embedding service, and stores the
    /// normalized embedding together with the photo id and URL.
    ///
    /// Progress is saved every `--every` photos. An interrupted run can be
    /// restarted with the same command: photos already stored are skipped,
    /// and at most the photos since the last save are embedded again.
    ///
    /// Photos that cannot be downloaded or embedded are logged and skipped;
    /// malformed catalog rows are skipped with a warning.
    ///
    /// Requires the embedding service at `embedding_endpoint` to be running.
    Ingest {
        /// Catalog file (default: config `catalog_path`)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Store layout: positional or keyed
        #[arg(long)]
        layout: Option<StoreLayout>,

        /// Save progress after this many photos
        #[arg(long)]
        every: Option<usize>,

        /// Embedding service URL
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Find the photos that best match a text query
    Search {
        /// What to look for, e.g. "two dogs playing in the snow"
        #[arg(required = true)]
        text: Vec<String>,

        /// Number of results (default: config `top_k`)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,

        /// Send the text as-is instead of through `query_template`
        #[arg(long)]
        raw: bool,

        /// Worker threads used to score the corpus
        #[arg(long, default_value_t = 1)]
        shards: usize,

        /// Embedding service URL
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Show what is stored in the index
    Status,
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Create the default config file if it does not exist
    Init,
    /// Print the config file path
    Path,
}

fn load_config(cli: &Cli) -> Result<(Config, PathBuf)> {
    let path = cli.config.clone().unwrap_or_else(config::config_file_path);
    let mut config = Config::load_from(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir.clone_from(data_dir);
    }
    Ok((config, path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, config_path) = load_config(&cli)?;

    twyg::setup(config.logging.clone())
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {e:?}"))?;
    log::debug!("Using configuration from {}", config_path.display());

    match cli.command {
        Commands::Ingest {
            catalog,
            layout,
            every,
            endpoint,
        } => {
            if let Some(catalog) = catalog {
                config.catalog_path = catalog;
            }
            if let Some(layout) = layout {
                config.layout = layout;
            }
            if let Some(every) = every {
                config.checkpoint_every = every;
            }
            if let Some(endpoint) = endpoint {
                config.embedding_endpoint = endpoint;
            }
            commands::run_ingest(config).await?;
        }
        Commands::Search {
            text,
            top_k,
            raw,
            shards,
            endpoint,
        } => {
            if let Some(endpoint) = endpoint {
                config.embedding_endpoint = endpoint;
            }
            let text = text.join(" ");
            commands::run_search(&config, &text, top_k, raw, shards).await?;
        }
        Commands::Status => {
            commands::show_status(&config)?;
        }
        Commands::Config(ConfigCommand::Show) => {
            commands::config::show_config(&config, &config_path);
        }
        Commands::Config(ConfigCommand::Init) => {
            commands::config::init_config()?;
        }
        Commands::Config(ConfigCommand::Path) => {
            commands::config::show_path(&config_path);
        }
    }

    Ok(())
}
