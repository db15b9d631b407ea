//! Book Commands

use uuid::Uuid;

use crate::domain::book::BookContext;

/// 创建书籍命令
#[derive(Debug, Clone)]
pub struct CreateBook {
    pub title: String,
    pub book_type: String,
    pub niche: String,
    pub context: BookContext,
    /// 未指定时按书籍类型决定
    pub publish_without_chapter_images: Option<bool>,
}

/// 更新书籍设置命令
#[derive(Debug, Clone)]
pub struct UpdateBookSettings {
    pub book_id: Uuid,
    pub context: Option<BookContext>,
    pub publish_without_chapter_images: Option<bool>,
    pub cover_image_prompt: Option<String>,
}

/// 上传封面命令
#[derive(Debug, Clone)]
pub struct UploadCoverImage {
    pub book_id: Uuid,
    pub data: Vec<u8>,
    pub extension: String,
}
