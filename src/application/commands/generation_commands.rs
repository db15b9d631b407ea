//! Generation Commands

use uuid::Uuid;

/// 开始生成命令
#[derive(Debug, Clone)]
pub struct StartGeneration {
    pub book_id: Uuid,
    /// 清除已有大纲、章节、用量后重新生成
    pub fresh: bool,
}

/// 重新排队命令（failed / paused -> pending）
#[derive(Debug, Clone)]
pub struct RequeueJob {
    pub job_id: Uuid,
}

/// 暂停排队中的任务（pending -> paused）
#[derive(Debug, Clone)]
pub struct PauseJob {
    pub job_id: Uuid,
}
