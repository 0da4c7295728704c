// src/pipeline/harvest.rs

//! Collection harvesting pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{Config, Folder};
use crate::services::{
    ApiTransport, CollectionHarvester, CommentStage, ContentTransport, DocumentRenderer,
    ExistenceCache, FolderEnd, HarvestSettings, HttpImageFetcher, HttpRenderer, ImageFetch,
    ImagePipeline, ImagePipelineSettings, QuestionCache,
};
use crate::storage::{ContentSink, ImageStore, ShardWriter};
use crate::utils::log;
use crate::utils::text::preview;

/// Collaborators a harvest run needs.
pub struct HarvestDeps {
    pub transport: Arc<dyn ContentTransport>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub fetcher: Arc<dyn ImageFetch>,
    pub sink: Arc<dyn ContentSink>,
    pub existence: Arc<ExistenceCache>,
    pub image_store: Arc<ImageStore>,
}

impl HarvestDeps {
    /// Default wiring: HTTP adapters, shard writer and shard-backed existence cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(ApiTransport::new(&config.crawler)?),
            renderer: Arc::new(HttpRenderer::new(&config.crawler)?),
            fetcher: Arc::new(HttpImageFetcher::new(&config.crawler)?),
            sink: Arc::new(ShardWriter::new(&config.output)),
            existence: Arc::new(ExistenceCache::from_shard_dir(
                config.output.shard_dir(),
                &config.output.crawler_type,
            )),
            image_store: Arc::new(ImageStore::new(config.output.image_dir())),
        })
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default)]
pub struct HarvestSummary {
    pub folders: usize,
    pub folders_failed: usize,
    pub pages: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub comments_attached: usize,
    pub comment_failures: usize,
    pub records_written: usize,
    pub files: Vec<PathBuf>,
    pub failed_chunks: usize,
    pub known_before: usize,
    pub questions_cached: usize,
    pub images_seen: usize,
}

/// Run the collection harvester over every configured (or discovered) folder.
pub async fn run_harvest(config: &Config, deps: HarvestDeps) -> Result<HarvestSummary> {
    let start_time = Utc::now();
    log::header("Collection harvest");

    let mut summary = HarvestSummary {
        known_before: deps.existence.load().await,
        ..HarvestSummary::default()
    };
    log::info(&format!(
        "{} items already stored ({:?} mode)",
        summary.known_before, config.collection.mode
    ));

    let folders = resolve_folders(config, deps.transport.as_ref()).await?;
    summary.folders = folders.len();
    if folders.is_empty() {
        log::warn("No folders to harvest");
        return Ok(summary);
    }

    let questions = Arc::new(QuestionCache::new(Arc::clone(&deps.transport)));
    let settings = HarvestSettings::from_config(
        &config.collection,
        config.concurrency.detail,
        config.throttle.item_delay_ms,
        config.throttle.page_delay_ms,
    );
    let mut harvester = CollectionHarvester::new(
        Arc::clone(&deps.transport),
        Arc::clone(&deps.existence),
        Arc::clone(&questions),
        Arc::clone(&deps.sink),
        settings,
    );

    let images = if config.images.enabled {
        let pipeline = Arc::new(ImagePipeline::new(
            Arc::clone(&deps.renderer),
            Arc::clone(&deps.fetcher),
            Arc::clone(&deps.image_store),
            ImagePipelineSettings {
                concurrency: config.concurrency.images,
                render_settle_ms: config.throttle.render_settle_ms,
                batch_delay_ms: config.throttle.image_batch_delay_ms,
            },
        )?);
        harvester = harvester.with_images(Arc::clone(&pipeline));
        Some(pipeline)
    } else {
        None
    };

    let mut comments = CommentStage::new(
        Arc::clone(&deps.transport),
        config.comments.clone(),
        config.concurrency.comments,
        config.throttle.comment_delay_ms,
    )
    .with_sink(Arc::clone(&deps.sink));
    if config.images.enabled {
        comments = comments.with_image_store(Arc::clone(&deps.image_store));
    }

    for (index, folder) in folders.iter().enumerate() {
        log::step(
            index + 1,
            folders.len(),
            &format!("Folder \"{}\" ({})", preview(&folder.title, 30), folder.id),
        );

        let mut outcome = harvester.harvest_folder(folder).await;
        summary.pages += outcome.pages;
        summary.enriched += outcome.enriched.len();
        summary.skipped += outcome.skipped.len();
        match &outcome.end {
            FolderEnd::PageError(e) => {
                summary.folders_failed += 1;
                log::warn(&format!("Folder {} stopped early: {}", folder.id, e));
            }
            end => log::sub_item(&format!(
                "{} enriched, {} skipped, {} pages ({:?})",
                outcome.enriched.len(),
                outcome.skipped.len(),
                outcome.pages,
                end
            )),
        }

        if config.comments.enabled && !outcome.enriched.is_empty() {
            let stats = comments.attach_all(&mut outcome.enriched).await;
            summary.comments_attached += stats.attached;
            summary.comment_failures += stats.failed;
            log::sub_item(&format!(
                "{} comments attached, {} threads failed",
                stats.attached, stats.failed
            ));
        }

        match deps.sink.flush().await {
            Ok(flushed) => {
                summary.records_written += flushed.records_written;
                summary.failed_chunks += flushed.failed_chunks;
                summary.files.extend(flushed.files);
            }
            Err(e) => log::warn(&format!("Flush after folder {} failed: {}", folder.id, e)),
        }
    }

    summary.questions_cached = questions.len().await;
    if let Some(pipeline) = &images {
        summary.images_seen = pipeline.seen_count().await;
    }

    let elapsed = Utc::now() - start_time;
    log::summary(
        "Harvest complete",
        &[
            (
                "Folders",
                format!("{} ({} stopped early)", summary.folders, summary.folders_failed),
            ),
            ("Pages", summary.pages.to_string()),
            ("Enriched", summary.enriched.to_string()),
            ("Skipped", summary.skipped.to_string()),
            ("Comments", summary.comments_attached.to_string()),
            ("Records written", summary.records_written.to_string()),
            ("Shard files", summary.files.len().to_string()),
            ("Questions cached", summary.questions_cached.to_string()),
            ("Images seen", summary.images_seen.to_string()),
            ("Elapsed", format!("{}s", elapsed.num_seconds())),
        ],
    );
    Ok(summary)
}

/// Configured folder ids, or every non-empty folder of the account.
async fn resolve_folders(
    config: &Config,
    transport: &dyn ContentTransport,
) -> Result<Vec<Folder>> {
    if !config.collection.folder_ids.is_empty() {
        return Ok(config
            .collection
            .folder_ids
            .iter()
            .map(|id| Folder {
                id: id.clone(),
                title: id.clone(),
                item_count: 0,
            })
            .collect());
    }

    let folders = transport.fetch_folders().await?;
    let total = folders.len();
    let non_empty: Vec<Folder> = folders.into_iter().filter(|f| f.item_count > 0).collect();
    if non_empty.len() < total {
        log::info(&format!("Skipping {} empty folders", total - non_empty.len()));
    }
    Ok(non_empty)
}
