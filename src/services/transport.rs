//! Collaborator interfaces consumed by the harvest pipeline.
//!
//! The pipeline never talks to the network directly: folder listings, detail
//! fetches and comment threads come through [`ContentTransport`], rendered
//! pages through [`DocumentRenderer`] and image bytes through [`ImageFetch`].

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CollectionItem, CommentRecord, ContentIds, ContentRecord, Folder, QuestionInfo};

/// Platform API access.
#[async_trait]
pub trait ContentTransport: Send + Sync {
    /// Folders owned by the signed-in account.
    async fn fetch_folders(&self) -> Result<Vec<Folder>>;

    /// One page of a folder listing.
    async fn fetch_collection_page(
        &self,
        folder_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CollectionItem>>;

    /// Full detail for one piece of content; `None` when the platform has nothing.
    async fn fetch_full_detail(&self, ids: &ContentIds) -> Result<Option<ContentRecord>>;

    /// Question metadata; `None` when the question cannot be resolved.
    async fn fetch_question_detail(&self, question_id: &str) -> Result<Option<QuestionInfo>>;

    /// Entire comment thread of a content record.
    async fn fetch_comment_thread(&self, content: &ContentRecord) -> Result<Vec<CommentRecord>>;
}

/// A rendered page as raw markup.
///
/// Kept as a string so it can cross await points; parse with
/// `scraper::Html::parse_document` where it is consumed.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub url: String,
    pub html: String,
}

/// Page rendering (a browser in production, plain HTTP by default).
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Navigate to `url`.
    async fn render(&self, url: &str) -> Result<()>;

    /// Snapshot of the page last rendered.
    async fn current_document(&self) -> Result<Document>;
}

/// Raw image response.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedImage {
    /// Whether the declared content type is an image type.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
    }
}

/// Image byte retrieval.
#[async_trait]
pub trait ImageFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedImage>;
}
