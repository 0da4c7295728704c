// src/services/existence.rs

//! Content existence cache for incremental runs.
//!
//! The identifier set is loaded once, lazily, from previously written shard
//! files or from a backing store, and then grows as records are stored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;

/// Shard prefixes recognized regardless of the configured crawler type.
const LEGACY_PREFIXES: [&str; 2] = ["collection_contents_", "contents_"];

/// A store that can list every content id it already holds.
#[async_trait]
pub trait IdentifierStore: Send + Sync {
    async fn content_ids(&self) -> Result<Vec<String>>;
}

enum Source {
    Shards { dir: PathBuf, prefixes: Vec<String> },
    Store(Arc<dyn IdentifierStore>),
}

#[derive(Default)]
struct State {
    ids: HashSet<String>,
    loaded: bool,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistenceStats {
    pub total: usize,
    pub loaded: bool,
}

pub struct ExistenceCache {
    source: Source,
    state: Mutex<State>,
}

impl ExistenceCache {
    /// Cache backed by JSON shards in `dir`.
    ///
    /// Files named `<crawler_type>_contents_*.json`, `collection_contents_*.json`
    /// or `contents_*.json` are scanned.
    pub fn from_shard_dir(dir: impl Into<PathBuf>, crawler_type: &str) -> Self {
        let mut prefixes = vec![format!("{crawler_type}_contents_")];
        for legacy in LEGACY_PREFIXES {
            if !prefixes.iter().any(|p| p == legacy) {
                prefixes.push(legacy.to_string());
            }
        }
        Self::with_source(Source::Shards {
            dir: dir.into(),
            prefixes,
        })
    }

    /// Cache backed by an identifier store.
    pub fn from_store(store: Arc<dyn IdentifierStore>) -> Self {
        Self::with_source(Source::Store(store))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            state: Mutex::new(State::default()),
        }
    }

    /// Populate the cache if it has not been loaded yet. Returns the id count.
    pub async fn load(&self) -> usize {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.ids.len()
    }

    /// Whether `content_id` is already known.
    pub async fn exists(&self, content_id: &str) -> bool {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.ids.contains(content_id)
    }

    /// Record an id for the rest of the run.
    pub async fn add(&self, content_id: impl Into<String>) {
        self.state.lock().await.ids.insert(content_id.into());
    }

    /// The subset of `ids` not yet known, in input order.
    pub async fn filter_new(&self, ids: Vec<String>) -> Vec<String> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;

        let total = ids.len();
        let fresh: Vec<String> = ids
            .into_iter()
            .filter(|id| !state.ids.contains(id))
            .collect();
        let skipped = total - fresh.len();
        if skipped > 0 {
            log::info!("Skipping {skipped} of {total} already stored items");
        }
        fresh
    }

    pub async fn stats(&self) -> ExistenceStats {
        let state = self.state.lock().await;
        ExistenceStats {
            total: state.ids.len(),
            loaded: state.loaded,
        }
    }

    /// Runs at most once; the caller holds the state lock, so concurrent
    /// first queries wait for the same load.
    async fn ensure_loaded(&self, state: &mut State) {
        if state.loaded {
            return;
        }
        let ids = match &self.source {
            Source::Shards { dir, prefixes } => load_shard_ids(dir, prefixes).await,
            Source::Store(store) => match store.content_ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    log::warn!("Existence store query failed, treating all content as new: {e}");
                    Vec::new()
                }
            },
        };
        state.ids.extend(ids);
        state.loaded = true;
        log::info!("Existence cache loaded with {} ids", state.ids.len());
    }
}

async fn load_shard_ids(dir: &Path, prefixes: &[String]) -> Vec<String> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("Shard directory {} does not exist yet", dir.display());
            return Vec::new();
        }
        Err(e) => {
            log::warn!("Cannot read shard directory {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.ends_with(".json") && prefixes.iter().any(|p| name.starts_with(p)) {
                    files.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Error while listing {}: {e}", dir.display());
                break;
            }
        }
    }
    files.sort();

    let mut ids = Vec::new();
    for path in files {
        match read_shard_ids(&path).await {
            Ok(found) => ids.extend(found),
            Err(e) => log::warn!("Skipping unreadable shard {}: {e}", path.display()),
        }
    }
    ids
}

async fn read_shard_ids(path: &Path) -> Result<Vec<String>> {
    let bytes = tokio::fs::read(path).await?;
    let entries: Vec<Value> = serde_json::from_slice(&bytes)?;
    Ok(entries
        .iter()
        .filter_map(|entry| match entry.get("content_id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use tempfile::tempdir;

    struct FailingStore;

    #[async_trait]
    impl IdentifierStore for FailingStore {
        async fn content_ids(&self) -> Result<Vec<String>> {
            Err(AppError::transport("store", "unavailable"))
        }
    }

    struct FixedStore(Vec<String>);

    #[async_trait]
    impl IdentifierStore for FixedStore {
        async fn content_ids(&self) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_loads_ids_from_matching_shards() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("collection_contents_2024-01-01_001.json"),
            r#"[{"content_id": "1"}, {"content_id": 2}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("contents_2023-12-31_001.json"),
            r#"[{"content_id": "3"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("other.json"), r#"[{"content_id": "9"}]"#).unwrap();

        let cache = ExistenceCache::from_shard_dir(dir.path(), "collection");
        assert!(cache.exists("1").await);
        assert!(cache.exists("2").await);
        assert!(cache.exists("3").await);
        assert!(!cache.exists("9").await);
        assert_eq!(
            cache.stats().await,
            ExistenceStats {
                total: 3,
                loaded: true
            }
        );
    }

    #[tokio::test]
    async fn test_corrupt_shard_is_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("collection_contents_2024-01-01_001.json"),
            "{not json",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("collection_contents_2024-01-01_002.json"),
            r#"[{"content_id": "ok"}]"#,
        )
        .unwrap();

        let cache = ExistenceCache::from_shard_dir(dir.path(), "collection");
        assert_eq!(cache.load().await, 1);
        assert!(cache.exists("ok").await);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let cache = ExistenceCache::from_shard_dir(dir.path().join("absent"), "collection");
        assert!(!cache.exists("1").await);
        assert_eq!(cache.stats().await.total, 0);
        assert!(cache.stats().await.loaded);
    }

    #[tokio::test]
    async fn test_add_and_filter_new() {
        let cache = ExistenceCache::from_store(Arc::new(FixedStore(vec!["a".into()])));
        assert!(!cache.stats().await.loaded);

        cache.add("b").await;
        let fresh = cache
            .filter_new(vec!["a".into(), "b".into(), "c".into()])
            .await;
        assert_eq!(fresh, vec!["c".to_string()]);
        assert_eq!(cache.stats().await.total, 2);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty() {
        let cache = ExistenceCache::from_store(Arc::new(FailingStore));
        assert!(!cache.exists("anything").await);
        assert!(cache.stats().await.loaded);
    }
}
