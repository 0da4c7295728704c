//! Content record data structures.

use serde::{Deserialize, Serialize};

use crate::models::{CommentRecord, ImageDescriptor, ImageRegion};
use crate::utils::text::IMAGE_PLACEHOLDER;

/// Kind of saved content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Answer,
    Article,
    #[serde(alias = "zvideo")]
    Video,
}

impl ContentKind {
    /// Parse the platform's `type` discriminator.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "answer" => Some(Self::Answer),
            "article" => Some(Self::Article),
            "zvideo" | "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Article => "article",
            Self::Video => "video",
        }
    }

    /// Resource segment used by the comment endpoints.
    pub fn comment_resource(&self) -> &'static str {
        match self {
            Self::Answer => "answers",
            Self::Article => "articles",
            Self::Video => "zvideos",
        }
    }
}

/// Identifier components required to re-fetch full content detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentIds {
    Answer {
        question_id: String,
        answer_id: String,
    },
    Article {
        article_id: String,
    },
    Video {
        video_id: String,
    },
}

impl ContentIds {
    /// Parse the canonical content URL into the ids the given kind requires.
    ///
    /// Answers need both `/question/{qid}/answer/{aid}` components; articles
    /// (`/p/{id}`) and videos (`/zvideo/{id}`) take the last path segment.
    pub fn from_url(content_url: &str, kind: ContentKind) -> Option<Self> {
        let parsed = url::Url::parse(content_url).ok()?;
        let segments: Vec<&str> = parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .collect();

        let after = |name: &str| -> Option<String> {
            let pos = segments.iter().position(|s| *s == name)?;
            segments.get(pos + 1).map(|s| s.to_string())
        };

        match kind {
            ContentKind::Answer => Some(Self::Answer {
                question_id: after("question")?,
                answer_id: after("answer")?,
            }),
            ContentKind::Article => segments.last().map(|id| Self::Article {
                article_id: id.to_string(),
            }),
            ContentKind::Video => segments.last().map(|id| Self::Video {
                video_id: id.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Answer { .. } => ContentKind::Answer,
            Self::Article { .. } => ContentKind::Article,
            Self::Video { .. } => ContentKind::Video,
        }
    }
}

/// Author summary attached to content and comments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthorSummary {
    pub user_id: String,
    pub nickname: String,
    pub url_token: String,
    pub avatar_url: String,
    pub gender: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub voteup_count: u64,
    pub thanked_count: u64,
}

impl AuthorSummary {
    pub fn is_populated(&self) -> bool {
        !self.user_id.is_empty()
    }
}

/// Parent question metadata merged into answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuestionInfo {
    pub question_id: String,
    pub title: String,
    pub detail: String,
    pub tags: Vec<String>,
    pub follower_count: u64,
    pub answer_count: u64,
    pub view_count: u64,
}

/// Which document regions contained images.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegionFlags {
    pub question: bool,
    pub answer: bool,
    pub comment: bool,
}

impl RegionFlags {
    pub fn mark(&mut self, region: ImageRegion) {
        match region {
            ImageRegion::Question => self.question = true,
            ImageRegion::Answer => self.answer = true,
            ImageRegion::Comment => self.comment = true,
        }
    }
}

/// A fully resolved piece of saved content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    pub content_id: String,
    pub content_type: ContentKind,
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    pub title: String,
    /// Excerpt shown in listings
    #[serde(default)]
    pub desc: String,
    /// Body text with `[图片]` placeholders where images were
    #[serde(default)]
    pub content_text: String,
    #[serde(default)]
    pub created_time: i64,
    #[serde(default)]
    pub updated_time: i64,
    #[serde(default)]
    pub voteup_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub author: AuthorSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionInfo>,
    #[serde(default)]
    pub has_images: RegionFlags,
    #[serde(default)]
    pub images: Vec<ImageDescriptor>,
    #[serde(default)]
    pub images_processed: bool,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

impl ContentRecord {
    /// Create an empty record of the given kind.
    pub fn new(content_id: impl Into<String>, content_type: ContentKind) -> Self {
        Self {
            content_id: content_id.into(),
            content_type,
            content_url: String::new(),
            title: String::new(),
            desc: String::new(),
            content_text: String::new(),
            created_time: 0,
            updated_time: 0,
            voteup_count: 0,
            comment_count: 0,
            topics: Vec::new(),
            author: AuthorSummary::default(),
            question_id: None,
            question: None,
            has_images: RegionFlags::default(),
            images: Vec::new(),
            images_processed: false,
            comments: Vec::new(),
        }
    }

    /// Ids needed for a full-detail fetch.
    ///
    /// Falls back to the record's own ids when the URL is an API link
    /// rather than a canonical page URL.
    pub fn detail_ids(&self) -> Option<ContentIds> {
        ContentIds::from_url(&self.content_url, self.content_type).or_else(|| {
            match self.content_type {
                ContentKind::Answer => Some(ContentIds::Answer {
                    question_id: self.question_id.clone()?,
                    answer_id: self.content_id.clone(),
                }),
                ContentKind::Article => Some(ContentIds::Article {
                    article_id: self.content_id.clone(),
                }),
                ContentKind::Video => Some(ContentIds::Video {
                    video_id: self.content_id.clone(),
                }),
            }
        })
    }

    /// Merge a full-detail fetch, keeping listing data where the fetch is empty.
    pub fn merge_detail(&mut self, full: ContentRecord) {
        if !full.content_text.is_empty() {
            self.content_text = full.content_text;
        }
        if !full.desc.is_empty() {
            self.desc = full.desc;
        }
        if full.created_time > 0 {
            self.created_time = full.created_time;
        }
        if full.updated_time > 0 {
            self.updated_time = full.updated_time;
        }
        if self.content_type == ContentKind::Answer && full.question_id.is_some() {
            self.question_id = full.question_id;
        }
        if full.voteup_count > 0 {
            self.voteup_count = full.voteup_count;
        }
        if full.comment_count > 0 {
            self.comment_count = full.comment_count;
        }
        if full.author.is_populated() {
            self.author = full.author;
        }
    }

    /// Merge parent question metadata into an answer.
    pub fn merge_question(&mut self, question: QuestionInfo) {
        if self.title.is_empty() {
            self.title = question.title.clone();
        }
        self.question_id = Some(question.question_id.clone());
        self.question = Some(question);
    }

    /// Whether the body, excerpt or question detail carries image placeholders.
    pub fn has_image_placeholders(&self) -> bool {
        self.content_text.contains(IMAGE_PLACEHOLDER)
            || self.desc.contains(IMAGE_PLACEHOLDER)
            || self
                .question
                .as_ref()
                .is_some_and(|q| q.detail.contains(IMAGE_PLACEHOLDER))
    }
}
