//! Pipeline entry points for harvester operations.
//!
//! - `run_harvest`: Harvest collection folders into JSON shards
//! - `backfill_comments`: Attach missing comment threads to an existing shard

pub mod backfill;
pub mod harvest;

pub use backfill::{BackfillSummary, backfill_comments, latest_shard};
pub use harvest::{HarvestDeps, HarvestSummary, run_harvest};
