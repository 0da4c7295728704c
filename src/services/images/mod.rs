//! Image discovery and dedup engine.
//!
//! - `extract`: region-scoped discovery with noise filters and run-wide dedup
//! - `download`: bounded downloads and the per-item image pass
//! - `placeholder`: in-order `[图片]` substitution

mod download;
mod extract;
mod placeholder;

pub use download::{ImagePassStats, ImagePipeline, ImagePipelineSettings};
pub use extract::{ImageExtractor, SeenImages};
pub use placeholder::{resolved_placeholder, substitute_in_order, substitute_placeholders};
