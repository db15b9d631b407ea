//! Book Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BookContext, BookError, BookTitle, BookType, Niche, Outline};
use crate::domain::generation::TransitionError;

/// 书籍状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Draft,
    Generating,
    Complete,
    Failed,
    Published,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Draft => "draft",
            BookStatus::Generating => "generating",
            BookStatus::Complete => "complete",
            BookStatus::Failed => "failed",
            BookStatus::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(BookStatus::Draft),
            "generating" => Some(BookStatus::Generating),
            "complete" => Some(BookStatus::Complete),
            "failed" => Some(BookStatus::Failed),
            "published" => Some(BookStatus::Published),
            _ => None,
        }
    }
}

/// 发布产物格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishFormat {
    Epub,
    Docx,
}

impl PublishFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishFormat::Epub => "epub",
            PublishFormat::Docx => "docx",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "epub" => Some(PublishFormat::Epub),
            "docx" => Some(PublishFormat::Docx),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PublishFormat::Epub => "application/epub+zip",
            PublishFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// 已发布产物引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArtifact {
    pub format: PublishFormat,
    pub url: String,
}

/// Book 聚合根
///
/// 不变量:
/// - 状态只经由 `start_generation` / `finish_generation` / `fail_generation` / `mark_published` 变更
/// - `total_chapters` 在首次开始生成时确定
///
/// 这些方法在内存快照上校验迁移；持久化由存储端口按列条件更新完成
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub book_type: BookType,
    pub niche: Niche,
    pub status: BookStatus,
    pub context: BookContext,
    pub total_chapters: Option<u32>,
    pub outline: Option<Outline>,
    pub cover_image_prompt: Option<String>,
    pub cover_image_url: Option<String>,
    pub publish_without_chapter_images: bool,
    pub artifacts: Vec<PublishedArtifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn new(
        owner_id: impl Into<String>,
        title: BookTitle,
        book_type: BookType,
        niche: Niche,
        context: BookContext,
        publish_without_chapter_images: bool,
    ) -> Result<Self, BookError> {
        context.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: title.into_inner(),
            book_type,
            niche,
            status: BookStatus::Draft,
            context,
            total_chapters: None,
            outline: None,
            cover_image_prompt: None,
            cover_image_url: None,
            publish_without_chapter_images,
            artifacts: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// 进入生成状态（新建任务或重新排队）
    pub fn start_generation(&mut self, total_chapters: u32) -> Result<(), BookError> {
        if self.status == BookStatus::Generating {
            return Err(self.transition_error(BookStatus::Generating).into());
        }
        self.total_chapters = Some(total_chapters);
        self.set_status(BookStatus::Generating);
        Ok(())
    }

    pub fn finish_generation(&mut self) -> Result<(), BookError> {
        self.leave_generating(BookStatus::Complete)
    }

    pub fn fail_generation(&mut self) -> Result<(), BookError> {
        self.leave_generating(BookStatus::Failed)
    }

    /// 发布成功后调用
    pub fn mark_published(&mut self, artifacts: Vec<PublishedArtifact>) -> Result<(), BookError> {
        if !self.can_publish() {
            return Err(self.transition_error(BookStatus::Published).into());
        }
        for artifact in artifacts {
            self.artifacts.retain(|a| a.format != artifact.format);
            self.artifacts.push(artifact);
        }
        self.set_status(BookStatus::Published);
        Ok(())
    }

    /// 草稿与生成中的书籍不可发布
    pub fn can_publish(&self) -> bool {
        matches!(
            self.status,
            BookStatus::Complete | BookStatus::Failed | BookStatus::Published
        )
    }

    fn leave_generating(&mut self, next: BookStatus) -> Result<(), BookError> {
        if self.status != BookStatus::Generating {
            return Err(self.transition_error(next).into());
        }
        self.set_status(next);
        Ok(())
    }

    fn set_status(&mut self, status: BookStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn transition_error(&self, to: BookStatus) -> TransitionError {
        TransitionError::new("book", self.status.as_str(), to.as_str())
    }
}
