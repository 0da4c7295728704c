// src/services/enricher.rs

//! Collection paginator and item enricher.
//!
//! Walks one folder page by page, turns each saved item into a
//! [`ContentRecord`], merges full detail and question metadata, runs the image
//! pass and hands the result to the sink.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, Semaphore};

use crate::models::{
    CollectionConfig, CollectionItem, ContentKind, ContentRecord, CrawlMode, Folder, ResolvedItem,
};
use crate::services::existence::ExistenceCache;
use crate::services::images::ImagePipeline;
use crate::services::questions::QuestionCache;
use crate::services::transport::ContentTransport;
use crate::storage::ContentSink;
use crate::utils::{pause, text::preview};

/// Why an item was not enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Listing entry without a content payload
    Empty,
    /// Type other than answer or article
    Unsupported(String),
    /// Stored by an earlier run
    AlreadyStored,
    /// Seen earlier in this run
    Duplicate,
}

/// Result for one listing item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Enriched(Box<ContentRecord>),
    Skipped { content_id: String, reason: SkipReason },
}

/// How a folder's page loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEnd {
    /// A page came back empty
    Exhausted,
    /// The per-folder item cap was reached
    Capped,
    /// A page fetch failed
    PageError(String),
}

/// Result of harvesting one folder.
#[derive(Debug, Clone)]
pub struct FolderOutcome {
    pub folder_id: String,
    pub pages: usize,
    pub enriched: Vec<ContentRecord>,
    pub skipped: Vec<(String, SkipReason)>,
    pub end: FolderEnd,
}

impl FolderOutcome {
    fn new(folder_id: &str) -> Self {
        Self {
            folder_id: folder_id.to_string(),
            pages: 0,
            enriched: Vec::new(),
            skipped: Vec::new(),
            end: FolderEnd::Exhausted,
        }
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Enriched(record) => self.enriched.push(*record),
            ItemOutcome::Skipped { content_id, reason } => self.skipped.push((content_id, reason)),
        }
    }
}

/// Paging and throttling knobs.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub page_size: usize,
    /// 0 for unlimited
    pub max_items: usize,
    pub mode: CrawlMode,
    pub detail_concurrency: usize,
    pub item_delay_ms: u64,
    pub page_delay_ms: u64,
}

impl HarvestSettings {
    pub fn from_config(
        collection: &CollectionConfig,
        detail_concurrency: usize,
        item_delay_ms: u64,
        page_delay_ms: u64,
    ) -> Self {
        Self {
            page_size: collection.page_size.max(1),
            max_items: collection.max_items,
            mode: collection.mode,
            detail_concurrency: detail_concurrency.max(1),
            item_delay_ms,
            page_delay_ms,
        }
    }
}

pub struct CollectionHarvester {
    transport: Arc<dyn ContentTransport>,
    existence: Arc<ExistenceCache>,
    questions: Arc<QuestionCache>,
    images: Option<Arc<ImagePipeline>>,
    sink: Arc<dyn ContentSink>,
    settings: HarvestSettings,
    detail_permits: Semaphore,
    processed: Mutex<HashSet<String>>,
}

impl CollectionHarvester {
    pub fn new(
        transport: Arc<dyn ContentTransport>,
        existence: Arc<ExistenceCache>,
        questions: Arc<QuestionCache>,
        sink: Arc<dyn ContentSink>,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            transport,
            existence,
            questions,
            images: None,
            sink,
            detail_permits: Semaphore::new(settings.detail_concurrency.max(1)),
            settings,
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Enable the image pass.
    pub fn with_images(mut self, images: Arc<ImagePipeline>) -> Self {
        self.images = Some(images);
        self
    }

    fn cap_reached(&self, accepted: usize) -> bool {
        self.settings.max_items > 0 && accepted >= self.settings.max_items
    }

    /// Harvest one folder. Never fails: a page error ends this folder only.
    pub async fn harvest_folder(&self, folder: &Folder) -> FolderOutcome {
        let mut outcome = FolderOutcome::new(&folder.id);
        let limit = self.settings.page_size;
        let mut page = 0;

        loop {
            let offset = page * limit;
            let items = match self
                .transport
                .fetch_collection_page(&folder.id, offset, limit)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    log::warn!("Folder {} page at offset {} failed: {}", folder.id, offset, e);
                    outcome.end = FolderEnd::PageError(e.to_string());
                    break;
                }
            };
            if items.is_empty() {
                outcome.end = FolderEnd::Exhausted;
                break;
            }
            outcome.pages += 1;
            log::info!(
                "Folder {} page {}: {} items",
                folder.id,
                page + 1,
                items.len()
            );

            // Triage in listing order so the cap and dedup see a stable sequence.
            let mut pending = Vec::new();
            let mut capped = false;
            for item in items {
                if self.cap_reached(outcome.enriched.len() + pending.len()) {
                    capped = true;
                    break;
                }
                match self.triage(item).await {
                    Ok(record) => pending.push(record),
                    Err((content_id, reason)) => {
                        log::debug!("Skipping {content_id}: {reason:?}");
                        outcome.record(ItemOutcome::Skipped { content_id, reason });
                    }
                }
            }

            let mut enriched = stream::iter(pending)
                .map(|record| self.enrich(record))
                .buffered(self.settings.detail_concurrency);
            while let Some(mut record) = enriched.next().await {
                // In listing order, so run-wide image attribution follows the folder.
                self.process_images(&mut record).await;
                if let Err(e) = self.sink.store_content(&record).await {
                    log::warn!("Sink rejected {}: {}", record.content_id, e);
                }
                self.existence.add(record.content_id.clone()).await;
                outcome.record(ItemOutcome::Enriched(Box::new(record)));
                pause(self.settings.item_delay_ms).await;
            }

            if capped || self.cap_reached(outcome.enriched.len()) {
                log::info!("Folder {} reached the item cap", folder.id);
                outcome.end = FolderEnd::Capped;
                break;
            }

            page += 1;
            pause(self.settings.page_delay_ms).await;
        }

        outcome
    }

    /// Resolve the item type and apply the existence gate.
    async fn triage(
        &self,
        item: CollectionItem,
    ) -> std::result::Result<ContentRecord, (String, SkipReason)> {
        let resolved = item
            .resolve()
            .ok_or_else(|| (String::new(), SkipReason::Empty))?;
        let content_id = resolved.content_id().to_string();

        if let ResolvedItem::Unsupported { kind, .. } = &resolved {
            log::info!("Unsupported item type {kind} ({content_id})");
            return Err((content_id, SkipReason::Unsupported(kind.clone())));
        }
        if self.settings.mode == CrawlMode::Incremental
            && self.existence.exists(&content_id).await
        {
            return Err((content_id, SkipReason::AlreadyStored));
        }
        if !self.processed.lock().await.insert(content_id.clone()) {
            return Err((content_id, SkipReason::Duplicate));
        }

        resolved
            .into_record()
            .ok_or((content_id, SkipReason::Empty))
    }

    /// Best-effort enrichment; every failure degrades to listing data.
    async fn enrich(&self, mut record: ContentRecord) -> ContentRecord {
        self.merge_full_detail(&mut record).await;

        if record.content_type == ContentKind::Answer
            && let Some(question_id) = record.question_id.clone()
            && let Some(question) = self.questions.get(&question_id).await
        {
            record.merge_question(question);
        }

        log::info!(
            "Enriched {} {} \"{}\"",
            record.content_type.as_str(),
            record.content_id,
            preview(&record.title, 30)
        );
        record
    }

    async fn process_images(&self, record: &mut ContentRecord) {
        if let Some(images) = &self.images
            && !record.images_processed
            && record.has_image_placeholders()
            && let Err(e) = images.process(record).await
        {
            log::warn!("Image pass failed for {}: {}", record.content_id, e);
        }
    }

    async fn merge_full_detail(&self, record: &mut ContentRecord) {
        let Some(ids) = record.detail_ids() else {
            log::debug!("No detail ids for {}", record.content_id);
            return;
        };

        let fetched = {
            let _permit = self.detail_permits.acquire().await;
            self.transport.fetch_full_detail(&ids).await
        };
        match fetched {
            Ok(Some(full)) => record.merge_detail(full),
            Ok(None) => log::debug!("No detail for {}", record.content_id),
            Err(e) => log::warn!(
                "Detail fetch failed for {}, keeping listing data: {}",
                record.content_id,
                e
            ),
        }
    }
}
