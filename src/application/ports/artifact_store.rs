//! Artifact Store Port - 出站端口
//!
//! 封面、插图、音频、电子书等产物按 key 存储，对外以 URL 引用

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// 产物存储错误
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(String),
}

#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    /// 写入产物（覆盖），返回公开 URL
    async fn put(&self, key: &str, data: &[u8]) -> Result<String, ArtifactStoreError>;

    /// 产物的本地路径（用于下载）
    fn resolve(&self, key: &str) -> Result<PathBuf, ArtifactStoreError>;

    /// 产物的公开 URL
    fn url_for(&self, key: &str) -> String;

    async fn exists(&self, key: &str) -> bool;
}
