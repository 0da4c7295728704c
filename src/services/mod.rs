//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Skipping already stored content (`ExistenceCache`)
//! - Question metadata memoization (`QuestionCache`)
//! - Folder pagination and enrichment (`CollectionHarvester`)
//! - Image discovery, download and placeholder rewriting (`images`)
//! - Comment attachment (`CommentStage`)
//! - Collaborator traits and their HTTP defaults (`transport`, `http`)

mod comments;
mod enricher;
mod existence;
pub mod http;
pub mod images;
mod questions;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use comments::{CommentOutcome, CommentStage, CommentStats, select_hot};
pub use enricher::{
    CollectionHarvester, FolderEnd, FolderOutcome, HarvestSettings, ItemOutcome, SkipReason,
};
pub use existence::{ExistenceCache, ExistenceStats, IdentifierStore};
pub use http::{ApiTransport, HttpImageFetcher, HttpRenderer};
pub use images::{ImagePipeline, ImagePipelineSettings};
pub use questions::QuestionCache;
pub use transport::{ContentTransport, Document, DocumentRenderer, FetchedImage, ImageFetch};
