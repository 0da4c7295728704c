//! Storage abstractions for harvested content.
//!
//! ## Directory Structure
//!
//! ```text
//! {data_dir}/
//! ├── json/                                        # Shards (immutable once written)
//! │   ├── collection_contents_2025-01-05_001.json
//! │   └── collection_contents_2025-01-05_002.json
//! └── images/
//!     └── collection_contents/
//!         └── {content_id}/
//!             ├── question_001.jpg
//!             ├── answer_001.png
//!             └── comment_001.jpg
//! ```

pub mod images;
pub mod shards;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CommentRecord, ContentRecord};

// Re-export for convenience
pub use images::ImageStore;
pub use shards::ShardWriter;

/// Result of a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Records written across all shards
    pub records_written: usize,
    /// Shard files written, in index order
    pub files: Vec<PathBuf>,
    /// Chunks that failed to write
    pub failed_chunks: usize,
}

/// Destination for enriched records and their comments.
#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Buffer a content record. Comments already on the record are ignored.
    async fn store_content(&self, record: &ContentRecord) -> Result<()>;

    /// Buffer a comment under its owning content.
    async fn store_comment(&self, comment: &CommentRecord) -> Result<()>;

    /// Persist everything buffered and clear the buffer.
    async fn flush(&self) -> Result<FlushSummary>;
}
