//! Artifact Packager Port - 电子书打包
//!
//! EPUB / DOCX 的具体格式由外部服务负责

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::book::{Book, PublishFormat};
use crate::domain::generation::Chapter;

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Packaging service error: {0}")]
    ServiceError(String),
}

/// 打包输入
#[derive(Debug, Clone, Serialize)]
pub struct Manuscript {
    pub title: String,
    pub cover_image_url: Option<String>,
    pub chapters: Vec<ManuscriptChapter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManuscriptChapter {
    pub number: u32,
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
}

impl Manuscript {
    /// 用现有内容组装，缺失的章节正文为空
    pub fn assemble(book: &Book, chapters: &[Chapter]) -> Self {
        let mut ordered: Vec<&Chapter> = chapters.iter().collect();
        ordered.sort_by_key(|c| c.number);
        Self {
            title: book.title.clone(),
            cover_image_url: book.cover_image_url.clone(),
            chapters: ordered
                .into_iter()
                .map(|c| ManuscriptChapter {
                    number: c.number,
                    title: c.title.clone(),
                    text: c.text.clone().unwrap_or_default(),
                    image_url: c.image_url.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait ArtifactPackagerPort: Send + Sync {
    async fn package(&self, manuscript: &Manuscript, format: PublishFormat) -> Result<Vec<u8>, PackagingError>;
}
