// src/services/comments.rs

//! Comment attachment stage.
//!
//! One task per enriched record, bounded by a permit pool. A failing thread
//! is logged and never cancels its siblings.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::models::{CommentConfig, CommentMode, CommentRecord, ContentRecord, ImageRegion};
use crate::services::images::substitute_in_order;
use crate::services::transport::ContentTransport;
use crate::storage::{ContentSink, ImageStore};
use crate::utils::pause;

/// Per-record result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    Attached(usize),
    /// Zero comment counter, nothing fetched
    Skipped,
    Failed(String),
}

/// Totals over one batch of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentStats {
    pub records: usize,
    pub attached: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Keep comments with at least `min_likes`, most liked first, at most
/// `top_k`. Ties keep encounter order.
pub fn select_hot(
    comments: Vec<CommentRecord>,
    min_likes: u64,
    top_k: usize,
) -> Vec<CommentRecord> {
    let mut hot: Vec<CommentRecord> = comments
        .into_iter()
        .filter(|c| c.like_count >= min_likes)
        .collect();
    hot.sort_by(|a, b| b.like_count.cmp(&a.like_count));
    hot.truncate(top_k);
    hot
}

pub struct CommentStage {
    transport: Arc<dyn ContentTransport>,
    sink: Option<Arc<dyn ContentSink>>,
    images: Option<Arc<ImageStore>>,
    permits: Arc<Semaphore>,
    config: CommentConfig,
    delay_ms: u64,
}

impl CommentStage {
    pub fn new(
        transport: Arc<dyn ContentTransport>,
        config: CommentConfig,
        concurrency: usize,
        delay_ms: u64,
    ) -> Self {
        Self {
            transport,
            sink: None,
            images: None,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            config,
            delay_ms,
        }
    }

    /// Forward attached comments to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ContentSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Substitute comment-image placeholders from previously downloaded files.
    pub fn with_image_store(mut self, store: Arc<ImageStore>) -> Self {
        self.images = Some(store);
        self
    }

    /// Attach comments to every record concurrently.
    pub async fn attach_all<'a>(
        &self,
        records: impl IntoIterator<Item = &'a mut ContentRecord>,
    ) -> CommentStats {
        let outcomes = join_all(records.into_iter().map(|record| self.attach(record))).await;

        let mut stats = CommentStats {
            records: outcomes.len(),
            ..CommentStats::default()
        };
        for outcome in outcomes {
            match outcome {
                CommentOutcome::Attached(n) => stats.attached += n,
                CommentOutcome::Skipped => stats.skipped += 1,
                CommentOutcome::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }

    /// Fetch, reduce and store the thread of one record.
    pub async fn attach(&self, record: &mut ContentRecord) -> CommentOutcome {
        if record.comment_count == 0 {
            return CommentOutcome::Skipped;
        }

        let fetched = {
            let Ok(_permit) = self.permits.acquire().await else {
                return CommentOutcome::Failed("comment pool closed".into());
            };
            let fetched = self.transport.fetch_comment_thread(record).await;
            pause(self.delay_ms).await;
            fetched
        };

        let thread = match fetched {
            Ok(thread) => thread,
            Err(e) => {
                log::warn!("Comments for {} failed: {}", record.content_id, e);
                return CommentOutcome::Failed(e.to_string());
            }
        };

        let total = thread.len();
        let mut comments = match self.config.mode {
            CommentMode::Full => thread,
            CommentMode::Hot => select_hot(thread, self.config.min_likes, self.config.hot_count),
        };
        self.substitute_images(record, &mut comments).await;

        if let Some(sink) = &self.sink {
            for comment in &comments {
                if let Err(e) = sink.store_comment(comment).await {
                    log::warn!("Sink rejected comment {}: {}", comment.comment_id, e);
                }
            }
        }
        log::debug!(
            "Attached {} of {} comments to {}",
            comments.len(),
            total,
            record.content_id
        );

        let attached = comments.len();
        record.comments.extend(comments);
        CommentOutcome::Attached(attached)
    }

    async fn substitute_images(&self, record: &ContentRecord, comments: &mut [CommentRecord]) {
        let Some(store) = &self.images else { return };
        if !record.images_processed || !record.has_images.comment {
            return;
        }

        match store.list_region(&record.content_id, ImageRegion::Comment).await {
            Ok(filenames) if !filenames.is_empty() => {
                substitute_in_order(comments.iter_mut().map(|c| &mut c.content), &filenames);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Cannot list comment images for {}: {}", record.content_id, e),
        }
    }
}
