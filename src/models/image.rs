//! Image descriptor data structures.

use serde::{Deserialize, Serialize};

use crate::utils::url::url_digest;

/// Document region an image was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRegion {
    Question,
    Answer,
    Comment,
}

impl ImageRegion {
    /// Scan order; earlier regions win identity ties.
    pub const ORDER: [ImageRegion; 3] = [Self::Question, Self::Answer, Self::Comment];

    /// Filename prefix for images of this region.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Comment => "comment",
        }
    }

    /// Build the sequential filename, e.g. `answer_003.png`.
    pub fn filename(&self, seq: usize, extension: &str) -> String {
        format!("{}_{:03}.{}", self.prefix(), seq, extension)
    }
}

/// An image selected for download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Absolute source URL
    pub url: String,

    /// Content-addressed token from the URL path, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    pub region: ImageRegion,

    /// Target filename on disk
    pub filename: String,

    /// Downloaded size in bytes (0 until downloaded)
    #[serde(default)]
    pub size: u64,
}

impl ImageDescriptor {
    /// Key used for run-wide deduplication.
    pub fn dedup_key(&self) -> String {
        self.identity
            .clone()
            .unwrap_or_else(|| format!("url:{}", url_digest(&self.url)))
    }
}
