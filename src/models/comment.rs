//! Comment data structure.

use serde::{Deserialize, Serialize};

use crate::models::{AuthorSummary, ContentKind};

/// Parent id carried by top-level comments.
pub const TOP_LEVEL_PARENT: &str = "0";

/// A comment attached to a content record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentRecord {
    pub comment_id: String,

    /// Parent comment id, `"0"` for top-level comments
    #[serde(default = "default_parent")]
    pub parent_comment_id: String,

    /// Owning content id
    pub content_id: String,

    pub content_type: ContentKind,

    /// Comment body, may carry `[图片]` placeholders
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub publish_time: i64,

    #[serde(default)]
    pub ip_location: String,

    #[serde(default)]
    pub like_count: u64,

    #[serde(default)]
    pub dislike_count: u64,

    #[serde(default)]
    pub sub_comment_count: u64,

    #[serde(default)]
    pub author: AuthorSummary,
}

fn default_parent() -> String {
    TOP_LEVEL_PARENT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parent_defaults_to_top_level() {
        let json = r#"{"comment_id":"c1","content_id":"1","content_type":"answer"}"#;
        let comment: CommentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(comment.parent_comment_id, "0");
    }
}
