// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod comment;
mod config;
mod content;
mod image;
mod payload;

// Re-export all public types
pub use comment::{CommentRecord, TOP_LEVEL_PARENT};
pub use config::{
    CollectionConfig, CommentConfig, CommentMode, ConcurrencyConfig, Config, CrawlMode,
    CrawlerConfig, ImageConfig, LoggingConfig, OutputConfig, ThrottleConfig,
};
pub use content::{AuthorSummary, ContentIds, ContentKind, ContentRecord, QuestionInfo, RegionFlags};
pub use image::{ImageDescriptor, ImageRegion};
pub use payload::{
    ApiPage, CollectionItem, Folder, Paging, RawAuthor, RawComment, RawContent, RawFolder,
    RawQuestion, ResolvedItem,
};
