//! Downloaded image persistence.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ImageRegion;

/// Stores images under `{root}/{content_id}/{filename}`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn content_dir(&self, content_id: &str) -> PathBuf {
        self.root.join(content_id)
    }

    /// Save image bytes, returning the written path.
    pub async fn save(&self, content_id: &str, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        if filename.contains(['/', '\\']) || content_id.contains(['/', '\\']) {
            return Err(AppError::validation(format!(
                "refusing to write image outside the store: {content_id}/{filename}"
            )));
        }
        let dir = self.content_dir(content_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(filename);
        let tmp = path.with_extension("part");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Filenames previously saved for one region of a content item, sorted.
    pub async fn list_region(&self, content_id: &str, region: ImageRegion) -> Result<Vec<String>> {
        let dir = self.content_dir(content_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let prefix = format!("{}_", region.prefix());
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && !name.ends_with(".part") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_list_region_sorted() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        store.save("42", "comment_002.png", b"b").await.unwrap();
        store.save("42", "comment_001.jpg", b"a").await.unwrap();
        store.save("42", "answer_001.jpg", b"c").await.unwrap();

        assert_eq!(
            store.list_region("42", ImageRegion::Comment).await.unwrap(),
            vec!["comment_001.jpg", "comment_002.png"]
        );
        assert_eq!(
            std::fs::read(dir.path().join("42").join("answer_001.jpg")).unwrap(),
            b"c"
        );
    }

    #[tokio::test]
    async fn test_list_missing_content_is_empty() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(
            store
                .list_region("nope", ImageRegion::Answer)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_save_rejects_path_separators() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(store.save("42", "../escape.jpg", b"x").await.is_err());
    }
}
