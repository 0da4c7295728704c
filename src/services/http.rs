// src/services/http.rs

//! Default `reqwest` adapters for the collaborator traits.
//!
//! They authenticate with the configured cookie only; session acquisition is
//! somebody else's job.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    ApiPage, CollectionItem, CommentRecord, ContentIds, ContentKind, ContentRecord, CrawlerConfig,
    Folder, QuestionInfo, RawComment, RawContent, RawFolder, RawQuestion,
};
use crate::services::transport::{
    ContentTransport, Document, DocumentRenderer, FetchedImage, ImageFetch,
};
use crate::utils::http::create_async_client;

const ANSWER_INCLUDE: &str =
    "content,excerpt,voteup_count,comment_count,created_time,updated_time,question,author";
const QUESTION_INCLUDE: &str = "detail,topics,follower_count,answer_count,visit_count";
const COMMENT_PAGE_SIZE: usize = 20;
const FOLDER_PAGE_SIZE: usize = 20;

/// Signed-in account, as returned by `/api/v4/me`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Me {
    url_token: String,
}

/// JSON API transport.
pub struct ApiTransport {
    client: Client,
    base_url: Url,
}

impl ApiTransport {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            base_url: Url::parse(&config.base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// GET and decode JSON; `None` on 404.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::transport(url.as_str(), format!("HTTP {status}")));
        }
        let bytes = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn get_page<T: DeserializeOwned>(&self, url: Url) -> Result<ApiPage<T>> {
        let context = url.to_string();
        self.get_json(url)
            .await?
            .ok_or_else(|| AppError::transport(context, "not found"))
    }
}

#[async_trait]
impl ContentTransport for ApiTransport {
    async fn fetch_folders(&self) -> Result<Vec<Folder>> {
        let me: Me = self
            .get_json(self.endpoint("/api/v4/me")?)
            .await?
            .ok_or_else(|| AppError::transport("/api/v4/me", "account not found"))?;
        if me.url_token.is_empty() {
            return Err(AppError::transport("/api/v4/me", "cookie is not signed in"));
        }

        let mut folders = Vec::new();
        let mut offset = 0;
        loop {
            let mut url = self.endpoint(&format!("/api/v4/people/{}/collections", me.url_token))?;
            url.query_pairs_mut()
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &FOLDER_PAGE_SIZE.to_string());

            let page: ApiPage<RawFolder> = self.get_page(url).await?;
            let fetched = page.data.len();
            folders.extend(page.data.into_iter().map(Folder::from));
            if page.paging.is_end || fetched == 0 {
                break;
            }
            offset += fetched;
        }
        Ok(folders)
    }

    async fn fetch_collection_page(
        &self,
        folder_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CollectionItem>> {
        let mut url = self.endpoint(&format!("/api/v4/collections/{folder_id}/items"))?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());

        let page: ApiPage<Value> = self.get_page(url).await?;
        Ok(decode_items(folder_id, page.data))
    }

    async fn fetch_full_detail(&self, ids: &ContentIds) -> Result<Option<ContentRecord>> {
        let path = match ids {
            ContentIds::Answer { answer_id, .. } => format!("/api/v4/answers/{answer_id}"),
            ContentIds::Article { article_id } => format!("/api/v4/articles/{article_id}"),
            ContentIds::Video { video_id } => format!("/api/v4/zvideos/{video_id}"),
        };
        let mut url = self.endpoint(&path)?;
        if ids.kind() == ContentKind::Answer {
            url.query_pairs_mut().append_pair("include", ANSWER_INCLUDE);
        }

        let raw: Option<RawContent> = self.get_json(url).await?;
        Ok(raw
            .filter(|c| !c.id.is_empty())
            .map(|c| c.into_record(ids.kind())))
    }

    async fn fetch_question_detail(&self, question_id: &str) -> Result<Option<QuestionInfo>> {
        let mut url = self.endpoint(&format!("/api/v4/questions/{question_id}"))?;
        url.query_pairs_mut().append_pair("include", QUESTION_INCLUDE);

        let raw: Option<RawQuestion> = self.get_json(url).await?;
        Ok(raw.filter(|q| !q.id.is_empty()).map(QuestionInfo::from))
    }

    async fn fetch_comment_thread(&self, content: &ContentRecord) -> Result<Vec<CommentRecord>> {
        let mut url = self.endpoint(&format!(
            "/api/v4/comment_v5/{}/{}/root_comment",
            content.content_type.comment_resource(),
            content.content_id
        ))?;
        url.query_pairs_mut()
            .append_pair("order_by", "score")
            .append_pair("limit", &COMMENT_PAGE_SIZE.to_string());

        let mut comments = Vec::new();
        loop {
            let page: ApiPage<RawComment> = self.get_page(url).await?;
            let fetched = page.data.len();
            comments.extend(page.data.into_iter().map(|c| c.into_record(content)));

            if page.paging.is_end || fetched == 0 || page.paging.next.is_empty() {
                break;
            }
            url = Url::parse(&page.paging.next)?;
        }
        Ok(comments)
    }
}

/// Decode listing entries one by one; an entry that cannot be read at all is
/// logged and dropped without losing the rest of the page.
fn decode_items(folder_id: &str, data: Vec<Value>) -> Vec<CollectionItem> {
    data.into_iter()
        .enumerate()
        .filter_map(|(position, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                log::warn!("Skipping unreadable item {position} in folder {folder_id}: {e}");
                None
            }
        })
        .collect()
}

/// Plain HTTP "renderer": fetches the page markup without executing scripts.
pub struct HttpRenderer {
    client: Client,
    current: Mutex<Option<Document>>,
}

impl HttpRenderer {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            current: Mutex::new(None),
        })
    }
}

#[async_trait]
impl DocumentRenderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<()> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::transport(
                url,
                format!("HTTP {}", response.status()),
            ));
        }
        let html = response.text().await?;
        *self.current.lock().await = Some(Document {
            url: url.to_string(),
            html,
        });
        Ok(())
    }

    async fn current_document(&self) -> Result<Document> {
        self.current
            .lock()
            .await
            .clone()
            .ok_or_else(|| AppError::transport("renderer", "no page rendered yet"))
    }
}

/// Image fetcher over HTTP.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }
}

#[async_trait]
impl ImageFetch for HttpImageFetcher {
    async fn get(&self, url: &str) -> Result<FetchedImage> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::transport(
                url,
                format!("HTTP {}", response.status()),
            ));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}
