//! Work Queue Port - 唤醒后台 worker
//!
//! 任务本身存储在 Job Store 中，这里只负责通知 worker 尽快轮询

/// 后台工作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    Generation,
    Audiobook,
}

pub trait WorkQueuePort: Send + Sync {
    /// 通知对应 worker 有新工作；通知可合并，不保证一对一送达
    fn wake(&self, kind: WorkKind);
}
