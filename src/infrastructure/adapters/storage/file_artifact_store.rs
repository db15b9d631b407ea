//! File Artifact Store - 文件系统产物存储实现
//!
//! key 是相对路径（如 `books/{id}/cover.png`），落在 base_dir 下，
//! 同一目录以 public_path 为前缀对外只读挂载

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::application::ports::{ArtifactStoreError, ArtifactStorePort};

/// 文件系统产物存储
pub struct FileArtifactStore {
    /// 存储根目录
    base_dir: PathBuf,
    /// 对外 URL 前缀（如 `/media`）
    public_path: String,
}

impl FileArtifactStore {
    /// 创建新的文件存储
    pub async fn new(base_dir: impl AsRef<Path>, public_path: impl Into<String>) -> Result<Self, ArtifactStoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        // 确保目录存在
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| ArtifactStoreError::IoError(e.to_string()))?;

        Ok(Self {
            base_dir,
            public_path: public_path.into(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 只接受普通的相对路径分量
    fn path_for(&self, key: &str) -> Result<PathBuf, ArtifactStoreError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(ArtifactStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl ArtifactStorePort for FileArtifactStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<String, ArtifactStoreError> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ArtifactStoreError::IoError(e.to_string()))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| ArtifactStoreError::IoError(e.to_string()))?;

        tracing::debug!(key = %key, size = data.len(), "Artifact stored");

        Ok(self.url_for(key))
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ArtifactStoreError> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(ArtifactStoreError::NotFound(key.to_string()));
        }
        Ok(path)
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_path.trim_end_matches('/'), key)
    }

    async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_and_resolve() {
        let temp_dir = tempdir().unwrap();
        let store = FileArtifactStore::new(temp_dir.path(), "/media/").await.unwrap();

        let url = store.put("books/abc/cover.png", b"png bytes").await.unwrap();
        assert_eq!(url, "/media/books/abc/cover.png");
        assert!(store.exists("books/abc/cover.png").await);

        let path = store.resolve("books/abc/cover.png").unwrap();
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"png bytes");

        // 覆盖写入
        store.put("books/abc/cover.png", b"new").await.unwrap();
        let path = store.resolve("books/abc/cover.png").unwrap();
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let temp_dir = tempdir().unwrap();
        let store = FileArtifactStore::new(temp_dir.path(), "/media").await.unwrap();

        for key in ["", "../etc/passwd", "/abs/path", "books/../../x"] {
            assert!(matches!(
                store.put(key, b"x").await,
                Err(ArtifactStoreError::InvalidKey(_))
            ));
        }
        assert!(matches!(
            store.resolve("audio/missing.mp3"),
            Err(ArtifactStoreError::NotFound(_))
        ));
        assert!(!store.exists("audio/missing.mp3").await);
    }
}
