//! In-memory collaborators for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{
    CollectionItem, CommentRecord, ContentIds, ContentKind, ContentRecord, Folder, QuestionInfo,
    TOP_LEVEL_PARENT,
};
use crate::services::transport::{
    ContentTransport, Document, DocumentRenderer, FetchedImage, ImageFetch,
};
use crate::storage::{ContentSink, FlushSummary};

pub fn answer_item(
    id: &str,
    question_id: &str,
    body_html: &str,
    comment_count: u64,
) -> CollectionItem {
    serde_json::from_value(json!({
        "content": {
            "type": "answer",
            "id": id,
            "url": format!("https://www.zhihu.com/question/{question_id}/answer/{id}"),
            "excerpt": format!("excerpt {id}"),
            "content": body_html,
            "created_time": 1_700_000_000,
            "voteup_count": 3,
            "comment_count": comment_count,
            "question": {"id": question_id, "title": format!("question {question_id}")},
            "author": {"id": "u1", "name": "listing author"}
        }
    }))
    .unwrap()
}

pub fn article_item(id: &str) -> CollectionItem {
    serde_json::from_value(json!({
        "content": {
            "type": "article",
            "id": id,
            "url": format!("https://zhuanlan.zhihu.com/p/{id}"),
            "title": format!("article {id}"),
            "created": 1_700_000_000
        }
    }))
    .unwrap()
}

pub fn pin_item(id: &str) -> CollectionItem {
    serde_json::from_value(json!({"content": {"type": "pin", "id": id}})).unwrap()
}

pub fn comment(id: &str, content_id: &str, like_count: u64) -> CommentRecord {
    CommentRecord {
        comment_id: id.into(),
        parent_comment_id: TOP_LEVEL_PARENT.into(),
        content_id: content_id.into(),
        content_type: ContentKind::Answer,
        content: format!("comment {id}"),
        publish_time: 0,
        ip_location: String::new(),
        like_count,
        dislike_count: 0,
        sub_comment_count: 0,
        author: Default::default(),
    }
}

#[derive(Default)]
struct TransportState {
    folders: Vec<Folder>,
    items: HashMap<String, Vec<CollectionItem>>,
    failing_pages: HashSet<(String, usize)>,
    page_calls: Vec<(String, usize)>,
    details: HashMap<String, ContentRecord>,
    failing_details: HashSet<String>,
    detail_calls: usize,
    detail_latency_ms: HashMap<String, u64>,
    questions: HashMap<String, QuestionInfo>,
    failing_questions: HashSet<String>,
    question_calls: HashMap<String, usize>,
    question_latency_ms: HashMap<String, u64>,
    comments: HashMap<String, Vec<CommentRecord>>,
    failing_comments: HashSet<String>,
    comment_calls: usize,
    comment_latency_ms: u64,
}

/// Scriptable [`ContentTransport`].
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<TransportState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    fn state(&self) -> std::sync::MutexGuard<'_, TransportState> {
        self.state.lock().unwrap()
    }

    pub fn add_folder(&self, id: &str, items: Vec<CollectionItem>) {
        let mut state = self.state();
        state.folders.push(Folder {
            id: id.into(),
            title: format!("folder {id}"),
            item_count: items.len() as u64,
        });
        state.items.insert(id.into(), items);
    }

    pub fn fail_page(&self, folder_id: &str, offset: usize) {
        self.state().failing_pages.insert((folder_id.into(), offset));
    }

    pub fn add_detail(&self, record: ContentRecord) {
        self.state().details.insert(record.content_id.clone(), record);
    }

    pub fn fail_detail(&self, content_id: &str) {
        self.state().failing_details.insert(content_id.into());
    }

    pub fn set_detail_latency(&self, content_id: &str, millis: u64) {
        self.state().detail_latency_ms.insert(content_id.into(), millis);
    }

    pub fn add_question(&self, id: &str, title: &str) {
        self.state().questions.insert(
            id.into(),
            QuestionInfo {
                question_id: id.into(),
                title: title.into(),
                ..QuestionInfo::default()
            },
        );
    }

    pub fn add_question_info(&self, info: QuestionInfo) {
        self.state().questions.insert(info.question_id.clone(), info);
    }

    pub fn set_question_latency(&self, id: &str, millis: u64) {
        self.state().question_latency_ms.insert(id.into(), millis);
    }

    pub fn fail_question(&self, id: &str) {
        self.state().failing_questions.insert(id.into());
    }

    pub fn add_comments(&self, content_id: &str, comments: Vec<CommentRecord>) {
        self.state().comments.insert(content_id.into(), comments);
    }

    pub fn fail_comments(&self, content_id: &str) {
        self.state().failing_comments.insert(content_id.into());
    }

    pub fn set_comment_latency(&self, millis: u64) {
        self.state().comment_latency_ms = millis;
    }

    pub fn page_calls(&self) -> Vec<(String, usize)> {
        self.state().page_calls.clone()
    }

    pub fn detail_calls(&self) -> usize {
        self.state().detail_calls
    }

    pub fn question_calls(&self, id: &str) -> usize {
        self.state().question_calls.get(id).copied().unwrap_or(0)
    }

    pub fn comment_calls(&self) -> usize {
        self.state().comment_calls
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentTransport for FakeTransport {
    async fn fetch_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.state().folders.clone())
    }

    async fn fetch_collection_page(
        &self,
        folder_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CollectionItem>> {
        let mut state = self.state();
        state.page_calls.push((folder_id.to_string(), offset));
        if state.failing_pages.contains(&(folder_id.to_string(), offset)) {
            return Err(AppError::transport(folder_id, "page failed"));
        }
        let items = state.items.get(folder_id).cloned().unwrap_or_default();
        Ok(items.into_iter().skip(offset).take(limit).collect())
    }

    async fn fetch_full_detail(&self, ids: &ContentIds) -> Result<Option<ContentRecord>> {
        let id = match ids {
            ContentIds::Answer { answer_id, .. } => answer_id,
            ContentIds::Article { article_id } => article_id,
            ContentIds::Video { video_id } => video_id,
        };
        let latency = self.state().detail_latency_ms.get(id).copied().unwrap_or(0);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let mut state = self.state();
        state.detail_calls += 1;
        if state.failing_details.contains(id) {
            return Err(AppError::transport(id.clone(), "detail failed"));
        }
        Ok(state.details.get(id).cloned())
    }

    async fn fetch_question_detail(&self, question_id: &str) -> Result<Option<QuestionInfo>> {
        let latency = self
            .state()
            .question_latency_ms
            .get(question_id)
            .copied()
            .unwrap_or(0);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let mut state = self.state();
        *state.question_calls.entry(question_id.to_string()).or_default() += 1;
        if state.failing_questions.contains(question_id) {
            return Err(AppError::transport(question_id, "question failed"));
        }
        Ok(state.questions.get(question_id).cloned())
    }

    async fn fetch_comment_thread(&self, content: &ContentRecord) -> Result<Vec<CommentRecord>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = {
            let mut state = self.state();
            state.comment_calls += 1;
            state.comment_latency_ms
        };
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let state = self.state();
        if state.failing_comments.contains(&content.content_id) {
            return Err(AppError::transport(content.content_id.clone(), "comments failed"));
        }
        Ok(state
            .comments
            .get(&content.content_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Serves canned HTML per URL.
#[derive(Default)]
pub struct FakeRenderer {
    pages: Mutex<HashMap<String, String>>,
    current: Mutex<Option<Document>>,
}

impl FakeRenderer {
    pub fn add_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }
}

#[async_trait]
impl DocumentRenderer for FakeRenderer {
    async fn render(&self, url: &str) -> Result<()> {
        let html = self
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::transport(url, "no such page"))?;
        *self.current.lock().unwrap() = Some(Document {
            url: url.to_string(),
            html,
        });
        Ok(())
    }

    async fn current_document(&self) -> Result<Document> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::transport("renderer", "nothing rendered"))
    }
}

/// Serves the URL bytes with a scripted content type.
#[derive(Default)]
pub struct FakeFetcher {
    images: Mutex<HashMap<String, String>>,
}

impl FakeFetcher {
    pub fn add_image(&self, url: &str, content_type: &str) {
        self.images
            .lock()
            .unwrap()
            .insert(url.to_string(), content_type.to_string());
    }
}

#[async_trait]
impl ImageFetch for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchedImage> {
        let content_type = self
            .images
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::transport(url, "404"))?;
        Ok(FetchedImage {
            bytes: url.as_bytes().to_vec(),
            content_type: Some(content_type),
        })
    }
}

/// Sink that records everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub contents: Mutex<Vec<ContentRecord>>,
    pub comments: Mutex<Vec<CommentRecord>>,
}

impl RecordingSink {
    pub fn content_ids(&self) -> Vec<String> {
        self.contents
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.content_id.clone())
            .collect()
    }

    pub fn comment_ids(&self) -> Vec<String> {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.comment_id.clone())
            .collect()
    }
}

#[async_trait]
impl ContentSink for RecordingSink {
    async fn store_content(&self, record: &ContentRecord) -> Result<()> {
        self.contents.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn store_comment(&self, comment: &CommentRecord) -> Result<()> {
        self.comments.lock().unwrap().push(comment.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<FlushSummary> {
        Ok(FlushSummary {
            records_written: self.contents.lock().unwrap().len(),
            ..FlushSummary::default()
        })
    }
}
