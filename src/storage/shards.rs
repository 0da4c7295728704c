// src/storage/shards.rs

//! Sharded JSON output writer.
//!
//! Records are buffered in first-stored order with their comments nested and
//! flushed into fixed-size, never-overwritten files named
//! `{crawler_type}_contents_{YYYY-MM-DD}_{NNN}.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{CommentRecord, ContentRecord, OutputConfig};
use crate::storage::{ContentSink, FlushSummary};

#[derive(Default)]
struct Buffer {
    order: Vec<String>,
    records: HashMap<String, ContentRecord>,
}

impl Buffer {
    fn drain(&mut self) -> Vec<ContentRecord> {
        let mut records = std::mem::take(&mut self.records);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|id| records.remove(&id))
            .collect()
    }
}

/// Local filesystem shard writer.
pub struct ShardWriter {
    dir: PathBuf,
    crawler_type: String,
    shard_size: usize,
    run_date: NaiveDate,
    buffer: Mutex<Buffer>,
    // Held for a whole flush so index selection and writes never interleave.
    flush_lock: Mutex<()>,
}

impl ShardWriter {
    /// Create a writer for today's date from the output settings.
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            dir: output.shard_dir(),
            crawler_type: output.crawler_type.clone(),
            shard_size: output.shard_size.max(1),
            run_date: Local::now().date_naive(),
            buffer: Mutex::new(Buffer::default()),
            flush_lock: Mutex::new(()),
        }
    }

    /// Pin the date used in shard names.
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of records currently buffered.
    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.order.len()
    }

    fn prefix(&self) -> String {
        format!(
            "{}_contents_{}_",
            self.crawler_type,
            self.run_date.format("%Y-%m-%d")
        )
    }

    /// One past the highest index already on disk for this date and type.
    async fn next_index(&self) -> Result<u32> {
        let prefix = self.prefix();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut max = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let index = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(index) = index {
                max = max.max(index);
            }
        }
        Ok(max + 1)
    }
}

/// Write records as a pretty JSON array atomically (write to temp, then rename).
pub(crate) async fn write_shard(path: &Path, records: &[ContentRecord]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records)?;
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(AppError::shard(path.display().to_string(), e));
    }
    Ok(())
}

/// Read one shard file back into records.
pub async fn read_shard(path: &Path) -> Result<Vec<ContentRecord>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ContentSink for ShardWriter {
    async fn store_content(&self, record: &ContentRecord) -> Result<()> {
        let mut buffer = self.buffer.lock().await;
        let mut record = record.clone();
        match buffer.records.get_mut(&record.content_id) {
            Some(existing) => {
                record.comments = std::mem::take(&mut existing.comments);
                *existing = record;
            }
            None => {
                record.comments.clear();
                buffer.order.push(record.content_id.clone());
                buffer.records.insert(record.content_id.clone(), record);
            }
        }
        Ok(())
    }

    async fn store_comment(&self, comment: &CommentRecord) -> Result<()> {
        let mut buffer = self.buffer.lock().await;
        match buffer.records.get_mut(&comment.content_id) {
            Some(record) => record.comments.push(comment.clone()),
            None => log::debug!(
                "Dropping comment {} for unknown content {}",
                comment.comment_id,
                comment.content_id
            ),
        }
        Ok(())
    }

    async fn flush(&self) -> Result<FlushSummary> {
        let _flushing = self.flush_lock.lock().await;
        let records = self.buffer.lock().await.drain();
        let mut summary = FlushSummary::default();
        if records.is_empty() {
            return Ok(summary);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let start = self.next_index().await?;
        let prefix = self.prefix();

        for (offset, chunk) in records.chunks(self.shard_size).enumerate() {
            let path = self
                .dir
                .join(format!("{}{:03}.json", prefix, start as usize + offset));
            match write_shard(&path, chunk).await {
                Ok(()) => {
                    log::info!("Wrote {} records to {}", chunk.len(), path.display());
                    summary.records_written += chunk.len();
                    summary.files.push(path);
                }
                Err(e) => {
                    log::warn!("Failed to write shard {}: {}", path.display(), e);
                    summary.failed_chunks += 1;
                }
            }
        }
        Ok(summary)
    }
}
