//! Repository Ports - 出站端口
//!
//! 定义数据持久化的抽象接口
//! 具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::audiobook::{
    AudioSegment, AudiobookJob, AudiobookStatus, AuxiliaryAsset, AuxiliaryKind,
};
use crate::domain::book::{Book, BookContext, BookStatus, Outline, PublishedArtifact};
use crate::domain::generation::{Chapter, GenerationJob, JobState, JobStatus, UsageEntry};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// 违反唯一性约束（如同一本书存在两个未结束任务）
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 状态机拒绝的迁移
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// 比较并交换失败：记录已被其他调用者修改
    #[error("Stale state: {0}")]
    StaleState(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// ============================================================================
// Book Repository
// ============================================================================

/// 书籍设置的部分更新，`None` 表示该项不变
#[derive(Debug, Clone, Default)]
pub struct BookSettingsUpdate {
    pub context: Option<BookContext>,
    pub publish_without_chapter_images: Option<bool>,
    /// `Some(None)` 清空封面提示词
    pub cover_image_prompt: Option<Option<String>>,
}

/// 书籍存储
///
/// 除 `save` 外的写入都只改写各自负责的列，
/// 用户侧修改与调度器的状态推进互不覆盖
#[async_trait]
pub trait BookRepositoryPort: Send + Sync {
    /// 整行写入（upsert），用于新建书籍
    async fn save(&self, book: &Book) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, RepositoryError>;

    /// 按创建时间倒序
    async fn find_all(&self) -> Result<Vec<Book>, RepositoryError>;

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Book>, RepositoryError>;

    /// 进入 generating 并确定章节数
    ///
    /// `reset_content` 同时清空大纲、封面与发布产物；书籍已在生成中时返回 `StaleState`
    async fn begin_generation(&self, id: Uuid, total_chapters: u32, reset_content: bool) -> Result<(), RepositoryError>;

    /// 从 generating 进入 `next`，书籍已不在生成中时返回 false
    async fn end_generation(&self, id: Uuid, next: BookStatus) -> Result<bool, RepositoryError>;

    /// 写入大纲，书籍不在生成中时返回 `StaleState`
    async fn set_outline(&self, id: Uuid, outline: &Outline) -> Result<(), RepositoryError>;

    /// 生成中修改 context 返回 `StaleState`，其余设置随时生效
    async fn update_settings(&self, id: Uuid, update: &BookSettingsUpdate) -> Result<(), RepositoryError>;

    /// 封面提示词为空时写入，返回是否写入
    async fn fill_cover_image_prompt(&self, id: Uuid, prompt: &str) -> Result<bool, RepositoryError>;

    /// 封面图为空时写入，返回是否写入
    async fn fill_cover_image_url(&self, id: Uuid, url: &str) -> Result<bool, RepositoryError>;

    async fn set_cover_image_url(&self, id: Uuid, url: &str) -> Result<(), RepositoryError>;

    /// 写入发布产物并置为 published
    ///
    /// 书籍为草稿或生成中时返回 `StaleState`
    async fn record_published(&self, id: Uuid, artifacts: &[PublishedArtifact]) -> Result<(), RepositoryError>;
}

// ============================================================================
// Generation Job Repository (Job Store)
// ============================================================================

#[async_trait]
pub trait GenerationJobRepositoryPort: Send + Sync {
    /// 创建任务
    ///
    /// 该书已存在未结束任务时返回 `Conflict`
    async fn create(&self, job: &GenerationJob) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationJob>, RepositoryError>;

    /// 该书最近创建的任务
    async fn find_latest_for_book(&self, book_id: Uuid) -> Result<Option<GenerationJob>, RepositoryError>;

    /// 该书当前未结束的任务
    async fn find_active_for_book(&self, book_id: Uuid) -> Result<Option<GenerationJob>, RepositoryError>;

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<GenerationJob>, RepositoryError>;

    /// 条件写入任务状态、进度、worker
    ///
    /// 仅当存储中的状态仍为 `expected` 且认领序号等于 `job.claim_seq` 时生效，
    /// 否则返回 `StaleState`
    async fn save_state(&self, job: &GenerationJob, expected: JobStatus) -> Result<(), RepositoryError>;

    /// 原子认领最早的 pending 任务
    ///
    /// 无大纲的书进入 `generating_outline`，已有大纲的进入 `generating_chapters`
    async fn claim_next(&self, worker_id: &str) -> Result<Option<GenerationJob>, RepositoryError>;

    /// 认领者刷新心跳（updated_at）
    ///
    /// worker 或认领序号不匹配（任务已被回收后重新认领）时返回 `StaleState`
    async fn heartbeat(&self, id: Uuid, worker_id: &str, claim_seq: u32) -> Result<(), RepositoryError>;

    /// 心跳早于 `before` 的已认领任务
    async fn find_stale(&self, before: DateTime<Utc>) -> Result<Vec<GenerationJob>, RepositoryError>;

    /// 校验状态机后更新任务状态
    async fn update_job_status(&self, id: Uuid, next: JobState) -> Result<GenerationJob, RepositoryError> {
        let mut job = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let expected = job.status();
        job.transition(next)
            .map_err(|e| RepositoryError::InvalidTransition(e.to_string()))?;
        self.save_state(&job, expected).await?;
        Ok(job)
    }
}

// ============================================================================
// Chapter Repository
// ============================================================================

#[async_trait]
pub trait ChapterRepositoryPort: Send + Sync {
    /// 按 (book_id, number) upsert
    async fn upsert(&self, chapter: &Chapter) -> Result<(), RepositoryError>;

    async fn find(&self, book_id: Uuid, number: u32) -> Result<Option<Chapter>, RepositoryError>;

    /// 按章节号升序
    async fn find_by_book(&self, book_id: Uuid) -> Result<Vec<Chapter>, RepositoryError>;

    /// 删除书的全部章节
    ///
    /// 该书存在未结束任务时返回 `Conflict`，不删除任何记录
    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64, RepositoryError>;
}

// ============================================================================
// Usage Repository
// ============================================================================

#[async_trait]
pub trait UsageRepositoryPort: Send + Sync {
    /// 追加一条用量
    async fn append(&self, entry: &UsageEntry) -> Result<(), RepositoryError>;

    async fn find_by_book(&self, book_id: Uuid) -> Result<Vec<UsageEntry>, RepositoryError>;

    async fn find_by_job(&self, job_id: Uuid) -> Result<Vec<UsageEntry>, RepositoryError>;

    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64, RepositoryError>;
}

// ============================================================================
// Audiobook Repository
// ============================================================================

#[async_trait]
pub trait AudiobookRepositoryPort: Send + Sync {
    /// 创建任务，该书已有 pending/generating 任务时返回 `Conflict`
    async fn create(&self, job: &AudiobookJob) -> Result<(), RepositoryError>;

    /// 包含已合成章节
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AudiobookJob>, RepositoryError>;

    async fn find_latest_for_book(&self, book_id: Uuid) -> Result<Option<AudiobookJob>, RepositoryError>;

    /// 仅读取状态（用于章节间的取消检查）
    async fn find_status(&self, id: Uuid) -> Result<Option<AudiobookStatus>, RepositoryError>;

    /// 该次认领是否仍在执行（status 为 generating 且认领序号未变）
    async fn is_running(&self, id: Uuid, claim_seq: u32) -> Result<bool, RepositoryError>;

    /// 条件写入状态与估算字段
    ///
    /// 仅当存储中的状态属于 `expected` 且认领序号等于 `job.claim_seq` 时生效，
    /// 否则返回 `StaleState`
    async fn save_state(&self, job: &AudiobookJob, expected: &[AudiobookStatus]) -> Result<(), RepositoryError>;

    /// 原子认领最早的 pending 任务，置为 generating 并递增认领序号
    async fn claim_next(&self) -> Result<Option<AudiobookJob>, RepositoryError>;

    /// 仅当任务仍处于 `expected` 状态且认领序号未变时写入章节音频
    ///
    /// 返回是否写入；累加 actual_cost 并更新 current_chapter
    async fn record_segment(
        &self,
        job_id: Uuid,
        chapter: u32,
        segment: &AudioSegment,
        expected: AudiobookStatus,
        claim_seq: u32,
    ) -> Result<bool, RepositoryError>;

    /// 取消 pending/generating 任务，只改状态与结束时间
    ///
    /// 已是终态时返回 `InvalidTransition`
    async fn cancel(&self, id: Uuid) -> Result<AudiobookJob, RepositoryError>;

    /// 附加音频（upsert，按 (book_id, kind)）
    async fn save_asset(&self, asset: &AuxiliaryAsset) -> Result<(), RepositoryError>;

    async fn find_asset(&self, book_id: Uuid, kind: AuxiliaryKind) -> Result<Option<AuxiliaryAsset>, RepositoryError>;

    async fn find_assets(&self, book_id: Uuid) -> Result<Vec<AuxiliaryAsset>, RepositoryError>;
}
