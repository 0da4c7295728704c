//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Which folders to harvest and how
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Fixed delays between requests
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Fan-out limits
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub comments: CommentConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.crawler.base_url)?;
        if self.collection.page_size == 0 {
            return Err(AppError::validation("collection.page_size must be > 0"));
        }
        if self.concurrency.detail == 0
            || self.concurrency.images == 0
            || self.concurrency.comments == 0
        {
            return Err(AppError::validation("concurrency limits must be > 0"));
        }
        if self.output.shard_size == 0 {
            return Err(AppError::validation("output.shard_size must be > 0"));
        }
        if self.output.crawler_type.trim().is_empty() {
            return Err(AppError::validation("output.crawler_type is empty"));
        }
        if self.comments.mode == CommentMode::Hot && self.comments.hot_count == 0 {
            return Err(AppError::validation(
                "comments.hot_count must be > 0 in hot mode",
            ));
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Platform origin
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Pre-acquired session cookie header
    #[serde(default)]
    pub cookie: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            base_url: defaults::base_url(),
            cookie: None,
        }
    }
}

/// Whether already-stored content is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    #[default]
    Incremental,
    Full,
}

/// Folder selection and pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Explicit folder ids; empty harvests every folder of the account
    #[serde(default)]
    pub folder_ids: Vec<String>,

    /// Items requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Per-folder item cap, 0 for unlimited
    #[serde(default)]
    pub max_items: usize,

    #[serde(default)]
    pub mode: CrawlMode,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            folder_ids: Vec::new(),
            page_size: defaults::page_size(),
            max_items: 0,
            mode: CrawlMode::default(),
        }
    }
}

/// Fixed delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "defaults::item_delay")]
    pub item_delay_ms: u64,

    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Wait after navigating before reading the rendered document
    #[serde(default = "defaults::render_settle")]
    pub render_settle_ms: u64,

    /// Wait after each item's image batch
    #[serde(default = "defaults::image_batch_delay")]
    pub image_batch_delay_ms: u64,

    /// Wait after each comment thread
    #[serde(default = "defaults::comment_delay")]
    pub comment_delay_ms: u64,
}

impl ThrottleConfig {
    /// No delays at all.
    pub fn none() -> Self {
        Self {
            item_delay_ms: 0,
            page_delay_ms: 0,
            render_settle_ms: 0,
            image_batch_delay_ms: 0,
            comment_delay_ms: 0,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: defaults::item_delay(),
            page_delay_ms: defaults::page_delay(),
            render_settle_ms: defaults::render_settle(),
            image_batch_delay_ms: defaults::image_batch_delay(),
            comment_delay_ms: defaults::comment_delay(),
        }
    }
}

/// Concurrency limits for each fan-out point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "defaults::detail_concurrency")]
    pub detail: usize,

    #[serde(default = "defaults::image_concurrency")]
    pub images: usize,

    #[serde(default = "defaults::comment_concurrency")]
    pub comments: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            detail: defaults::detail_concurrency(),
            images: defaults::image_concurrency(),
            comments: defaults::comment_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Comment thread handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentMode {
    #[default]
    Full,
    Hot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub mode: CommentMode,

    /// Minimum likes for a hot comment
    #[serde(default = "defaults::min_likes")]
    pub min_likes: u64,

    /// Number of hot comments kept
    #[serde(default = "defaults::hot_count")]
    pub hot_count: usize,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: CommentMode::default(),
            min_likes: defaults::min_likes(),
            hot_count: defaults::hot_count(),
        }
    }
}

/// Output layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root data directory
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Records per shard file
    #[serde(default = "defaults::shard_size")]
    pub shard_size: usize,

    /// Shard name prefix, e.g. `collection`
    #[serde(default = "defaults::crawler_type")]
    pub crawler_type: String,
}

impl OutputConfig {
    /// Directory holding the JSON shards.
    pub fn shard_dir(&self) -> PathBuf {
        self.data_dir.join("json")
    }

    /// Directory holding downloaded images.
    pub fn image_dir(&self) -> PathBuf {
        self.data_dir
            .join("images")
            .join(format!("{}_contents", self.crawler_type))
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            shard_size: defaults::shard_size(),
            crawler_type: defaults::crawler_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn base_url() -> String {
        "https://www.zhihu.com".into()
    }

    // Collection defaults
    pub fn page_size() -> usize {
        20
    }

    // Throttle defaults
    pub fn item_delay() -> u64 {
        500
    }
    pub fn page_delay() -> u64 {
        1000
    }
    pub fn render_settle() -> u64 {
        3000
    }
    pub fn image_batch_delay() -> u64 {
        2000
    }
    pub fn comment_delay() -> u64 {
        1000
    }

    // Concurrency defaults
    pub fn detail_concurrency() -> usize {
        3
    }
    pub fn image_concurrency() -> usize {
        3
    }
    pub fn comment_concurrency() -> usize {
        1
    }

    pub fn enabled() -> bool {
        true
    }

    // Comment defaults
    pub fn min_likes() -> u64 {
        10
    }
    pub fn hot_count() -> usize {
        10
    }

    // Output defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data/zhihu")
    }
    pub fn shard_size() -> usize {
        20
    }
    pub fn crawler_type() -> String {
        "collection".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.concurrency.comments = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.crawler.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [collection]
            folder_ids = ["42"]
            mode = "full"

            [comments]
            mode = "hot"
            min_likes = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.collection.folder_ids, vec!["42".to_string()]);
        assert_eq!(config.collection.mode, CrawlMode::Full);
        assert_eq!(config.collection.page_size, 20);
        assert_eq!(config.comments.mode, CommentMode::Hot);
        assert_eq!(config.comments.min_likes, 50);
        assert_eq!(config.comments.hot_count, 10);
        assert_eq!(config.output.shard_size, 20);
        assert!(config.images.enabled);
    }

    #[test]
    fn output_dirs_follow_crawler_type() {
        let output = OutputConfig::default();
        assert_eq!(output.shard_dir(), PathBuf::from("data/zhihu/json"));
        assert_eq!(
            output.image_dir(),
            PathBuf::from("data/zhihu/images/collection_contents")
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Config::load("does/not/exist.toml"),
            Err(AppError::Io(_))
        ));
    }
}
