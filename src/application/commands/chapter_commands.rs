//! Chapter Commands

use uuid::Uuid;

/// 直接编辑章节
#[derive(Debug, Clone)]
pub struct EditChapter {
    pub book_id: Uuid,
    pub chapter_number: u32,
    pub text: Option<String>,
    pub text_prompt: Option<String>,
    pub image_prompt: Option<String>,
}

/// 上传章节插图
#[derive(Debug, Clone)]
pub struct UploadChapterImage {
    pub book_id: Uuid,
    pub chapter_number: u32,
    pub data: Vec<u8>,
    pub extension: String,
}
