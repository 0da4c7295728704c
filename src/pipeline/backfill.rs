// src/pipeline/backfill.rs

//! Comment back-fill for shards written without comments.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

use crate::error::{AppError, Result};
use crate::models::{Config, ContentRecord};
use crate::services::{CommentStage, ContentTransport};
use crate::storage::ImageStore;
use crate::storage::shards::{read_shard, write_shard};
use crate::utils::log;

/// Totals for one back-filled shard.
#[derive(Debug, Clone, Default)]
pub struct BackfillSummary {
    pub records: usize,
    pub candidates: usize,
    pub comments_attached: usize,
    pub failed: usize,
    /// Copy of the shard taken before it was rewritten
    pub backup: Option<PathBuf>,
}

fn needs_comments(record: &ContentRecord) -> bool {
    record.comment_count > 0 && record.comments.is_empty()
}

fn backup_path(shard: &Path, at: NaiveDateTime) -> Result<PathBuf> {
    let stem = shard
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AppError::validation(format!("not a shard file: {}", shard.display())))?;
    Ok(shard.with_file_name(format!("{stem}_backup_{}.json", at.format("%Y%m%d_%H%M%S"))))
}

/// Newest `{crawler_type}_contents_*.json` shard in `dir` by name, backups excluded.
pub async fn latest_shard(dir: &Path, crawler_type: &str) -> Result<Option<PathBuf>> {
    let prefix = format!("{crawler_type}_contents_");
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut latest: Option<String> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix)
            && name.ends_with(".json")
            && !name.contains("_backup_")
            && latest.as_ref().is_none_or(|current| name > *current)
        {
            latest = Some(name);
        }
    }
    Ok(latest.map(|name| dir.join(name)))
}

/// Attach comments to every record of `shard` that reports comments but has
/// none, then rewrite the shard in place after backing it up.
pub async fn backfill_comments(
    config: &Config,
    shard: &Path,
    transport: Arc<dyn ContentTransport>,
) -> Result<BackfillSummary> {
    log::header("Comment back-fill");

    let mut records = read_shard(shard).await?;
    let mut summary = BackfillSummary {
        records: records.len(),
        candidates: records.iter().filter(|r| needs_comments(r)).count(),
        ..BackfillSummary::default()
    };
    log::info(&format!(
        "{} of {} records in {} need comments",
        summary.candidates,
        summary.records,
        shard.display()
    ));
    if summary.candidates == 0 {
        return Ok(summary);
    }

    let mut stage = CommentStage::new(
        transport,
        config.comments.clone(),
        config.concurrency.comments,
        config.throttle.comment_delay_ms,
    );
    if config.images.enabled {
        stage = stage.with_image_store(Arc::new(ImageStore::new(config.output.image_dir())));
    }

    let stats = stage
        .attach_all(records.iter_mut().filter(|r| needs_comments(r)))
        .await;
    summary.comments_attached = stats.attached;
    summary.failed = stats.failed;

    if stats.attached == 0 {
        log::warn(&format!(
            "No comments fetched, {} left untouched ({} threads failed)",
            shard.display(),
            stats.failed
        ));
        return Ok(summary);
    }

    let backup = backup_path(shard, Local::now().naive_local())?;
    tokio::fs::copy(shard, &backup).await?;
    write_shard(shard, &records).await?;

    log::success(&format!(
        "Attached {} comments to {}, backup at {}",
        stats.attached,
        shard.display(),
        backup.display()
    ));
    summary.backup = Some(backup);
    Ok(summary)
}
