// src/services/images/download.rs

//! Per-item image pass: render, extract, download, rewrite placeholders.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use url::Url;

use crate::error::Result;
use crate::models::{ContentRecord, ImageDescriptor, ImageRegion};
use crate::services::images::extract::{ImageExtractor, SeenImages};
use crate::services::images::placeholder::substitute_placeholders;
use crate::services::transport::{DocumentRenderer, ImageFetch};
use crate::storage::ImageStore;
use crate::utils::pause;

/// Counters for one item's image pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImagePassStats {
    pub discovered: usize,
    pub downloaded: usize,
}

/// Image pipeline settings.
#[derive(Debug, Clone, Copy)]
pub struct ImagePipelineSettings {
    pub concurrency: usize,
    pub render_settle_ms: u64,
    pub batch_delay_ms: u64,
}

pub struct ImagePipeline {
    renderer: Arc<dyn DocumentRenderer>,
    fetcher: Arc<dyn ImageFetch>,
    store: Arc<ImageStore>,
    extractor: ImageExtractor,
    seen: Mutex<SeenImages>,
    // One navigation at a time: the renderer holds a single current page.
    render_lock: Mutex<()>,
    permits: Semaphore,
    settings: ImagePipelineSettings,
}

impl ImagePipeline {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        fetcher: Arc<dyn ImageFetch>,
        store: Arc<ImageStore>,
        settings: ImagePipelineSettings,
    ) -> Result<Self> {
        Ok(Self {
            renderer,
            fetcher,
            store,
            extractor: ImageExtractor::new()?,
            seen: Mutex::new(SeenImages::default()),
            render_lock: Mutex::new(()),
            permits: Semaphore::new(settings.concurrency.max(1)),
            settings,
        })
    }

    /// Number of distinct images seen this run.
    pub async fn seen_count(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Fetch one image under the download pool.
    ///
    /// Any transport failure or non-image response yields `None`.
    pub async fn download(&self, descriptor: &ImageDescriptor) -> Option<Vec<u8>> {
        let _permit = self.permits.acquire().await.ok()?;
        match self.fetcher.get(&descriptor.url).await {
            Ok(fetched) if fetched.is_image() => Some(fetched.bytes),
            Ok(fetched) => {
                log::debug!(
                    "Ignoring {}: content type {:?}",
                    descriptor.url,
                    fetched.content_type
                );
                None
            }
            Err(e) => {
                log::debug!("Image download failed for {}: {}", descriptor.url, e);
                None
            }
        }
    }

    /// Run the image pass for one record. Does nothing once
    /// `images_processed` is set.
    pub async fn process(&self, record: &mut ContentRecord) -> Result<ImagePassStats> {
        if record.images_processed {
            return Ok(ImagePassStats::default());
        }

        let document = {
            let _guard = self.render_lock.lock().await;
            self.renderer.render(&record.content_url).await?;
            pause(self.settings.render_settle_ms).await;
            self.renderer.current_document().await?
        };

        let base = Url::parse(&document.url)
            .or_else(|_| Url::parse(&record.content_url))
            .ok();
        let descriptors = {
            let mut seen = self.seen.lock().await;
            self.extractor.extract(&document.html, base.as_ref(), &mut seen)
        };

        let mut stats = ImagePassStats {
            discovered: descriptors.len(),
            ..ImagePassStats::default()
        };
        for descriptor in &descriptors {
            record.has_images.mark(descriptor.region);
        }

        let fetched = join_all(descriptors.into_iter().map(|descriptor| async move {
            let bytes = self.download(&descriptor).await;
            (descriptor, bytes)
        }))
        .await;

        let mut saved = Vec::new();
        for (mut descriptor, bytes) in fetched {
            let Some(bytes) = bytes else { continue };
            match self
                .store
                .save(&record.content_id, &descriptor.filename, &bytes)
                .await
            {
                Ok(_) => {
                    descriptor.size = bytes.len() as u64;
                    saved.push(descriptor);
                }
                Err(e) => log::warn!(
                    "Could not save {} for {}: {}",
                    descriptor.filename,
                    record.content_id,
                    e
                ),
            }
        }
        stats.downloaded = saved.len();

        rewrite_placeholders(record, &saved);
        record.images.extend(saved);
        record.images_processed = true;

        log::debug!(
            "Images for {}: {} discovered, {} downloaded",
            record.content_id,
            stats.discovered,
            stats.downloaded
        );
        pause(self.settings.batch_delay_ms).await;
        Ok(stats)
    }
}

/// Rewrite answer-body and question-detail placeholders. Comment bodies are
/// handled when comments are attached.
fn rewrite_placeholders(record: &mut ContentRecord, saved: &[ImageDescriptor]) {
    let filenames = |region: ImageRegion| -> Vec<String> {
        saved
            .iter()
            .filter(|d| d.region == region)
            .map(|d| d.filename.clone())
            .collect()
    };

    let answer = filenames(ImageRegion::Answer);
    if !answer.is_empty() {
        let (text, _) = substitute_placeholders(&record.content_text, &answer);
        record.content_text = text;
    }

    let question = filenames(ImageRegion::Question);
    if let Some(info) = record.question.as_mut().filter(|_| !question.is_empty()) {
        let (detail, _) = substitute_placeholders(&info.detail, &question);
        info.detail = detail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, QuestionInfo};
    use crate::services::testing::{FakeFetcher, FakeRenderer};
    use tempfile::tempdir;

    const PAGE: &str = r#"
        <div class="QuestionRichText"><img src="https://pic1.zhimg.com/v2-aa11.jpg"></div>
        <div class="RichContent-inner">
          <img src="https://pic1.zhimg.com/v2-bb22.png">
          <img src="https://pic1.zhimg.com/v2-cc33.jpg">
          <img src="https://pic1.zhimg.com/v2-dd44.jpg">
        </div>
        <div class="CommentContent"><img src="https://pic1.zhimg.com/v2-ee55.jpg"></div>
    "#;
    const URL: &str = "https://www.zhihu.com/question/1/answer/2";

    fn settings() -> ImagePipelineSettings {
        ImagePipelineSettings {
            concurrency: 2,
            render_settle_ms: 0,
            batch_delay_ms: 0,
        }
    }

    fn record() -> ContentRecord {
        let mut record = ContentRecord::new("2", ContentKind::Answer);
        record.content_url = URL.into();
        record.content_text = "one [图片] two [图片] three [图片]".into();
        record.question = Some(QuestionInfo {
            question_id: "1".into(),
            detail: "asks [图片]".into(),
            ..QuestionInfo::default()
        });
        record
    }

    fn pipeline(root: &std::path::Path, fetcher: FakeFetcher) -> ImagePipeline {
        let renderer = FakeRenderer::default();
        renderer.add_page(URL, PAGE);
        ImagePipeline::new(
            Arc::new(renderer),
            Arc::new(fetcher),
            Arc::new(ImageStore::new(root)),
            settings(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_process_downloads_and_rewrites() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::default();
        fetcher.add_image("https://pic1.zhimg.com/v2-aa11.jpg", "image/jpeg");
        fetcher.add_image("https://pic1.zhimg.com/v2-bb22.png", "image/png");
        fetcher.add_image("https://pic1.zhimg.com/v2-cc33.jpg", "text/html");
        fetcher.add_image("https://pic1.zhimg.com/v2-dd44.jpg", "image/jpeg");
        fetcher.add_image("https://pic1.zhimg.com/v2-ee55.jpg", "image/jpeg");
        let pipeline = pipeline(dir.path(), fetcher);

        let mut record = record();
        let stats = pipeline.process(&mut record).await.unwrap();

        assert_eq!(stats.discovered, 5);
        assert_eq!(stats.downloaded, 4);
        assert!(record.images_processed);
        assert!(record.has_images.question);
        assert!(record.has_images.answer);
        assert!(record.has_images.comment);
        assert_eq!(
            record.content_text,
            "one [图片:answer_001.png] two [图片:answer_003.jpg] three [图片]"
        );
        assert_eq!(
            record.question.as_ref().unwrap().detail,
            "asks [图片:question_001.jpg]"
        );
        assert!(dir.path().join("2").join("comment_001.jpg").exists());
        assert!(!dir.path().join("2").join("answer_002.jpg").exists());
        assert!(record.images.iter().all(|i| i.size > 0));
    }

    #[tokio::test]
    async fn test_processed_record_is_not_reprocessed() {
        let dir = tempdir().unwrap();
        let fetcher = FakeFetcher::default();
        let pipeline = pipeline(dir.path(), fetcher);

        let mut record = record();
        record.images_processed = true;
        let stats = pipeline.process(&mut record).await.unwrap();

        assert_eq!(stats, ImagePassStats::default());
        assert_eq!(pipeline.seen_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_images_leave_placeholders() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path(), FakeFetcher::default());

        let mut record = record();
        let stats = pipeline.process(&mut record).await.unwrap();

        assert_eq!(stats.downloaded, 0);
        assert!(record.images_processed);
        assert_eq!(record.content_text, "one [图片] two [图片] three [图片]");
    }
}
