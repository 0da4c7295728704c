//! Raw platform payloads and their explicit mapping into domain records.
//!
//! Every field is optional on the wire: missing or `null` values fall back to
//! defaults instead of failing the whole item.

use serde::Deserialize;

use crate::models::{AuthorSummary, CommentRecord, ContentKind, ContentRecord, QuestionInfo};
use crate::utils::text::html_to_text;

/// Lenient field deserializers.
mod de {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept a string or number id; anything else becomes empty.
    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    /// Decode a field without ever failing the enclosing payload.
    ///
    /// `null` and wrong-typed values fall back to the default; numeric or
    /// boolean strings such as `"12"` are read as their value.
    pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(T::default());
        }
        if let Ok(parsed) = serde_json::from_value(value.clone()) {
            return Ok(parsed);
        }
        Ok(match &value {
            Value::String(s) => coerce(s)
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            _ => T::default(),
        })
    }

    fn coerce(s: &str) -> Option<Value> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Some(Value::from(n));
        }
        if let Ok(n) = s.parse::<u64>() {
            return Some(Value::from(n));
        }
        if let Ok(b) = s.parse::<bool>() {
            return Some(Value::Bool(b));
        }
        s.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
    }
}

/// One entry in a folder listing page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectionItem {
    #[serde(deserialize_with = "de::lenient")]
    pub content: Option<RawContent>,
}

/// Listing item resolved by its `type` discriminator.
#[derive(Debug, Clone)]
pub enum ResolvedItem {
    Answer(RawContent),
    Article(RawContent),
    Unsupported { kind: String, id: String },
}

impl CollectionItem {
    /// Resolve the item's type. `None` when the payload has no content.
    pub fn resolve(self) -> Option<ResolvedItem> {
        let content = self.content?;
        Some(match ContentKind::parse(&content.kind) {
            Some(ContentKind::Answer) => ResolvedItem::Answer(content),
            Some(ContentKind::Article) => ResolvedItem::Article(content),
            _ => ResolvedItem::Unsupported {
                kind: content.kind,
                id: content.id,
            },
        })
    }
}

impl ResolvedItem {
    pub fn content_id(&self) -> &str {
        match self {
            Self::Answer(c) | Self::Article(c) => &c.id,
            Self::Unsupported { id, .. } => id,
        }
    }

    /// Map into a content record; `None` for unsupported kinds.
    pub fn into_record(self) -> Option<ContentRecord> {
        match self {
            Self::Answer(c) => Some(c.into_record(ContentKind::Answer)),
            Self::Article(c) => Some(c.into_record(ContentKind::Article)),
            Self::Unsupported { .. } => None,
        }
    }
}

/// Answer, article or video payload, used both by listings and detail fetches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawContent {
    #[serde(rename = "type", deserialize_with = "de::lenient")]
    pub kind: String,
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(deserialize_with = "de::lenient")]
    pub url: String,
    #[serde(deserialize_with = "de::lenient")]
    pub title: String,
    #[serde(deserialize_with = "de::lenient")]
    pub excerpt: String,
    /// HTML body
    #[serde(deserialize_with = "de::lenient")]
    pub content: String,
    #[serde(deserialize_with = "de::lenient")]
    pub created_time: i64,
    #[serde(deserialize_with = "de::lenient")]
    pub updated_time: i64,
    #[serde(deserialize_with = "de::lenient")]
    pub created: i64,
    #[serde(deserialize_with = "de::lenient")]
    pub updated: i64,
    #[serde(deserialize_with = "de::lenient")]
    pub voteup_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub comment_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub question: Option<RawQuestionRef>,
    #[serde(deserialize_with = "de::lenient")]
    pub author: Option<RawAuthor>,
}

impl RawContent {
    /// Explicit field mapping with zero/empty defaults.
    pub fn into_record(self, kind: ContentKind) -> ContentRecord {
        let mut record = ContentRecord::new(self.id, kind);
        record.content_url = self.url;
        record.desc = self.excerpt;
        record.content_text = html_to_text(&self.content);
        record.voteup_count = self.voteup_count;
        record.comment_count = self.comment_count;
        record.author = self.author.map(RawAuthor::into_summary).unwrap_or_default();

        // Answers stamp `created_time`, articles and videos `created`.
        let (created, updated) = match kind {
            ContentKind::Answer => (self.created_time, self.updated_time),
            ContentKind::Article | ContentKind::Video => (self.created, self.updated),
        };
        record.created_time = if created > 0 {
            created
        } else {
            self.created_time.max(self.created)
        };
        record.updated_time = if updated > 0 {
            updated
        } else {
            self.updated_time.max(self.updated)
        };

        match (kind, self.question) {
            (ContentKind::Answer, Some(question)) => {
                record.title = question.title;
                record.topics = question.topics.into_iter().map(|t| t.name).collect();
                if !question.id.is_empty() {
                    record.question_id = Some(question.id);
                }
            }
            _ => record.title = self.title,
        }
        record
    }
}

/// Question reference embedded in an answer payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawQuestionRef {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(deserialize_with = "de::lenient")]
    pub title: String,
    #[serde(deserialize_with = "de::lenient")]
    pub topics: Vec<RawTopic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTopic {
    #[serde(deserialize_with = "de::lenient")]
    pub name: String,
}

/// Author payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAuthor {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(deserialize_with = "de::lenient")]
    pub name: String,
    #[serde(deserialize_with = "de::lenient")]
    pub url_token: String,
    #[serde(deserialize_with = "de::lenient")]
    pub avatar_url: String,
    #[serde(deserialize_with = "de::lenient")]
    pub gender: Option<i64>,
    #[serde(deserialize_with = "de::lenient")]
    pub follower_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub following_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub voteup_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub thanked_count: u64,
}

impl RawAuthor {
    pub fn into_summary(self) -> AuthorSummary {
        let gender = match self.gender {
            Some(1) => "male",
            Some(0) => "female",
            _ => "unknown",
        };
        AuthorSummary {
            user_id: self.id,
            nickname: self.name,
            url_token: self.url_token,
            avatar_url: self.avatar_url,
            gender: gender.to_string(),
            follower_count: self.follower_count,
            following_count: self.following_count,
            voteup_count: self.voteup_count,
            thanked_count: self.thanked_count,
        }
    }
}

/// A saved-items folder owned by the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub title: String,
    pub item_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFolder {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(deserialize_with = "de::lenient")]
    pub title: String,
    #[serde(deserialize_with = "de::lenient")]
    pub item_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub answer_count: u64,
}

impl From<RawFolder> for Folder {
    fn from(raw: RawFolder) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            item_count: raw.item_count.max(raw.answer_count),
        }
    }
}

/// Question detail payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawQuestion {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(deserialize_with = "de::lenient")]
    pub title: String,
    /// HTML detail
    #[serde(deserialize_with = "de::lenient")]
    pub detail: String,
    #[serde(deserialize_with = "de::lenient")]
    pub topics: Vec<RawTopic>,
    #[serde(deserialize_with = "de::lenient")]
    pub follower_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub answer_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub visit_count: u64,
}

impl From<RawQuestion> for QuestionInfo {
    fn from(raw: RawQuestion) -> Self {
        Self {
            question_id: raw.id,
            title: raw.title,
            detail: html_to_text(&raw.detail),
            tags: raw.topics.into_iter().map(|t| t.name).collect(),
            follower_count: raw.follower_count,
            answer_count: raw.answer_count,
            view_count: raw.visit_count,
        }
    }
}

/// Comment payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawComment {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(deserialize_with = "de::id")]
    pub reply_comment_id: String,
    /// HTML body
    #[serde(deserialize_with = "de::lenient")]
    pub content: String,
    #[serde(deserialize_with = "de::lenient")]
    pub created_time: i64,
    #[serde(deserialize_with = "de::lenient")]
    pub like_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub dislike_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub child_comment_count: u64,
    #[serde(deserialize_with = "de::lenient")]
    pub address_text: String,
    #[serde(deserialize_with = "de::lenient")]
    pub author: Option<RawAuthor>,
}

impl RawComment {
    /// Map into a comment owned by `content`.
    pub fn into_record(self, content: &ContentRecord) -> CommentRecord {
        let parent = if self.reply_comment_id.is_empty() {
            crate::models::TOP_LEVEL_PARENT.to_string()
        } else {
            self.reply_comment_id
        };
        CommentRecord {
            comment_id: self.id,
            parent_comment_id: parent,
            content_id: content.content_id.clone(),
            content_type: content.content_type,
            content: html_to_text(&self.content),
            publish_time: self.created_time,
            ip_location: self.address_text.replace("IP 属地", ""),
            like_count: self.like_count,
            dislike_count: self.dislike_count,
            sub_comment_count: self.child_comment_count,
            author: self.author.map(RawAuthor::into_summary).unwrap_or_default(),
        }
    }
}

/// Generic paged API envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Paging,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Paging {
    #[serde(deserialize_with = "de::lenient")]
    pub is_end: bool,
    #[serde(deserialize_with = "de::lenient")]
    pub next: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_item_maps_question_fields() {
        let json = r#"{
            "content": {
                "type": "answer",
                "id": 789,
                "url": "https://www.zhihu.com/question/123/answer/789",
                "excerpt": "short",
                "created_time": 1700000000,
                "voteup_count": 5,
                "question": {"id": "123", "title": "Q?", "topics": [{"name": "physics"}]},
                "author": {"id": "u1", "name": "alice", "gender": 0}
            }
        }"#;
        let item: CollectionItem = serde_json::from_str(json).unwrap();
        let record = item.resolve().unwrap().into_record().unwrap();

        assert_eq!(record.content_id, "789");
        assert_eq!(record.content_type, ContentKind::Answer);
        assert_eq!(record.title, "Q?");
        assert_eq!(record.topics, vec!["physics".to_string()]);
        assert_eq!(record.question_id.as_deref(), Some("123"));
        assert_eq!(record.created_time, 1700000000);
        assert_eq!(record.updated_time, 0);
        assert_eq!(record.comment_count, 0);
        assert_eq!(record.author.nickname, "alice");
        assert_eq!(record.author.gender, "female");
    }

    #[test]
    fn test_article_item_uses_created_field() {
        let json = r#"{"content": {"type": "article", "id": "55", "title": "Post",
            "created": 10, "updated": 20, "author": null, "comment_count": null}}"#;
        let item: CollectionItem = serde_json::from_str(json).unwrap();
        let record = item.resolve().unwrap().into_record().unwrap();

        assert_eq!(record.title, "Post");
        assert_eq!(record.created_time, 10);
        assert_eq!(record.updated_time, 20);
        assert_eq!(record.comment_count, 0);
        assert!(!record.author.is_populated());
    }

    #[test]
    fn test_unsupported_item_is_not_mapped() {
        let json = r#"{"content": {"type": "pin", "id": 9}}"#;
        let item: CollectionItem = serde_json::from_str(json).unwrap();
        let resolved = item.resolve().unwrap();

        assert_eq!(resolved.content_id(), "9");
        assert!(matches!(resolved, ResolvedItem::Unsupported { ref kind, .. } if kind == "pin"));
        assert!(resolved.into_record().is_none());
    }

    #[test]
    fn test_item_without_content_is_dropped() {
        let item: CollectionItem = serde_json::from_str("{}").unwrap();
        assert!(item.resolve().is_none());
    }

    #[test]
    fn test_question_payload_maps_counts() {
        let json = r#"{"id": 123, "title": "Q?", "detail": "<p>see</p><img src='x'>",
            "topics": [{"name": "a"}, {"name": "b"}], "follower_count": 7,
            "answer_count": 3, "visit_count": 1000}"#;
        let raw: RawQuestion = serde_json::from_str(json).unwrap();
        let info = QuestionInfo::from(raw);

        assert_eq!(info.question_id, "123");
        assert_eq!(info.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(info.view_count, 1000);
        assert!(info.detail.contains("[图片]"));
    }

    #[test]
    fn test_comment_payload_maps_parent_and_location() {
        let owner = ContentRecord::new("789", ContentKind::Answer);
        let json = r#"{"id": "c1", "content": "<p>nice</p>", "like_count": 4,
            "address_text": "IP 属地上海", "author": {"id": "u2", "name": "bob"}}"#;
        let raw: RawComment = serde_json::from_str(json).unwrap();
        let comment = raw.into_record(&owner);

        assert_eq!(comment.parent_comment_id, "0");
        assert_eq!(comment.content_id, "789");
        assert_eq!(comment.content, "nice");
        assert_eq!(comment.ip_location, "上海");
        assert_eq!(comment.author.nickname, "bob");
    }

    #[test]
    fn test_folder_count_prefers_larger_counter() {
        let raw: RawFolder =
            serde_json::from_str(r#"{"id": 1, "title": "Saved", "answer_count": 4}"#).unwrap();
        let folder = Folder::from(raw);
        assert_eq!(folder.id, "1");
        assert_eq!(folder.item_count, 4);
    }

    #[test]
    fn test_wrong_typed_fields_fall_back() {
        let json = r#"{"content": {"type": "answer", "id": "7",
            "voteup_count": "12", "comment_count": "n/a", "created_time": "soon",
            "question": "not an object", "author": {"name": "eve", "gender": "1"}}}"#;
        let item: CollectionItem = serde_json::from_str(json).unwrap();
        let record = item.resolve().unwrap().into_record().unwrap();

        assert_eq!(record.content_id, "7");
        assert_eq!(record.voteup_count, 12);
        assert_eq!(record.comment_count, 0);
        assert_eq!(record.created_time, 0);
        assert!(record.question_id.is_none());
        assert_eq!(record.author.nickname, "eve");
        assert_eq!(record.author.gender, "male");
    }

    #[test]
    fn test_numeric_looking_title_stays_text() {
        let json = r#"{"content": {"type": "article", "id": 3, "title": "2024"}}"#;
        let item: CollectionItem = serde_json::from_str(json).unwrap();
        let record = item.resolve().unwrap().into_record().unwrap();
        assert_eq!(record.title, "2024");
    }
}
