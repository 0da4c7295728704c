//! Collection Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use harvester::{
    error::{AppError, Result},
    models::{Config, CrawlMode},
    pipeline::{self, HarvestDeps},
    services::{ApiTransport, ExistenceCache},
};

/// Collection Harvester - saved-folder archiver
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Harvest saved collection folders into resumable JSON shards"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest folders into shards
    Harvest {
        /// Folder id to harvest (repeatable); overrides the configured list
        #[arg(short, long = "folder")]
        folders: Vec<String>,

        /// Reprocess items that are already stored
        #[arg(long)]
        full: bool,

        /// Per-folder item cap, 0 for unlimited
        #[arg(long)]
        max_items: Option<usize>,

        /// Skip the image pass
        #[arg(long)]
        no_images: bool,

        /// Skip comment attachment
        #[arg(long)]
        no_comments: bool,
    },

    /// Attach comments to shard records that report comments but have none
    Comments {
        /// Shard file to update; defaults to the newest shard
        shard: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Show what is already stored
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };
    init_logging(cli.verbose, &config.logging.level);

    match loaded {
        Ok(_) => log::info!("Loaded configuration from {}", cli.config.display()),
        Err(e) => log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        ),
    }

    match cli.command {
        Command::Harvest {
            folders,
            full,
            max_items,
            no_images,
            no_comments,
        } => {
            if !folders.is_empty() {
                config.collection.folder_ids = folders;
            }
            if full {
                config.collection.mode = CrawlMode::Full;
            }
            if let Some(max_items) = max_items {
                config.collection.max_items = max_items;
            }
            if no_images {
                config.images.enabled = false;
            }
            if no_comments {
                config.comments.enabled = false;
            }
            config.validate()?;

            if config.crawler.cookie.is_none() {
                log::warn!("No cookie configured; the platform will likely refuse folder listings");
            }

            let deps = HarvestDeps::from_config(&config)?;
            let summary = pipeline::run_harvest(&config, deps).await?;

            log::info!(
                "Harvest complete: {} records in {} shard files",
                summary.records_written,
                summary.files.len()
            );
        }

        Command::Comments { shard } => {
            config.validate()?;

            let shard = match shard {
                Some(shard) => shard,
                None => pipeline::latest_shard(
                    &config.output.shard_dir(),
                    &config.output.crawler_type,
                )
                .await?
                .ok_or_else(|| {
                    AppError::config(format!(
                        "no shard found in {}",
                        config.output.shard_dir().display()
                    ))
                })?,
            };

            let transport = Arc::new(ApiTransport::new(&config.crawler)?);
            let summary = pipeline::backfill_comments(&config, &shard, transport).await?;

            log::info!(
                "Back-fill complete: {} comments on {} of {} records",
                summary.comments_attached,
                summary.candidates,
                summary.records
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let shard_dir = config.output.shard_dir();
            log::info!("Data directory: {}", config.output.data_dir.display());
            log::info!("Shard directory: {}", shard_dir.display());

            let cache = ExistenceCache::from_shard_dir(&shard_dir, &config.output.crawler_type);
            cache.load().await;
            let stats = cache.stats().await;
            log::info!("Stored items: {}", stats.total);
            log::info!("Image directory: {}", config.output.image_dir().display());
        }
    }

    log::info!("Done!");

    Ok(())
}
