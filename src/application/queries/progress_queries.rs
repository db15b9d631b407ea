//! Progress Queries

use uuid::Uuid;

use crate::domain::generation::JobStatus;

/// 获取书籍的生成进度（任务 + 章节）
#[derive(Debug, Clone)]
pub struct GetGenerationProgress {
    pub book_id: Uuid,
}

/// 列出生成任务
#[derive(Debug, Clone)]
pub struct ListJobs {
    pub status: Option<JobStatus>,
}

/// 获取发布就绪状态
#[derive(Debug, Clone)]
pub struct GetPublishStatus {
    pub book_id: Uuid,
}
