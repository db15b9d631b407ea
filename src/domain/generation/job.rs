//! Generation Context - GenerationJob
//!
//! 状态机:
//! pending -> generating_outline -> outline_complete -> generating_chapters -> complete
//! 任意非终态 -> failed；failed / paused -> pending（requeue）；pending -> paused

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ProgressError, TransitionError};

/// 任务状态（存储用的扁平判别值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    GeneratingOutline,
    OutlineComplete,
    GeneratingChapters,
    Complete,
    Failed,
    Paused,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Pending,
        JobStatus::GeneratingOutline,
        JobStatus::OutlineComplete,
        JobStatus::GeneratingChapters,
        JobStatus::Complete,
        JobStatus::Failed,
        JobStatus::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::GeneratingOutline => "generating_outline",
            JobStatus::OutlineComplete => "outline_complete",
            JobStatus::GeneratingChapters => "generating_chapters",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::Paused => "paused",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// 终态：同一本书可以在终态任务之外再创建新任务
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// 已被 worker 认领、正在执行
    pub fn is_claimed(&self) -> bool {
        matches!(
            self,
            JobStatus::GeneratingOutline | JobStatus::OutlineComplete | JobStatus::GeneratingChapters
        )
    }

    pub fn accepts_requeue(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Paused)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, GeneratingOutline | GeneratingChapters | Paused) => true,
            (GeneratingOutline, OutlineComplete) => true,
            (OutlineComplete, GeneratingChapters) => true,
            (GeneratingChapters, Complete) => true,
            (Failed | Paused, Pending) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// 任务状态（带状态数据）
///
/// 只有 `Failed` 携带错误，只有 `Complete` 携带完成时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    GeneratingOutline,
    OutlineComplete,
    GeneratingChapters,
    Complete { completed_at: DateTime<Utc> },
    Failed { error: String },
    Paused,
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::GeneratingOutline => JobStatus::GeneratingOutline,
            JobState::OutlineComplete => JobStatus::OutlineComplete,
            JobState::GeneratingChapters => JobStatus::GeneratingChapters,
            JobState::Complete { .. } => JobStatus::Complete,
            JobState::Failed { .. } => JobStatus::Failed,
            JobState::Paused => JobStatus::Paused,
        }
    }

    /// 从存储的扁平字段重建
    pub fn from_parts(
        status: JobStatus,
        error: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        match status {
            JobStatus::Pending => JobState::Pending,
            JobStatus::GeneratingOutline => JobState::GeneratingOutline,
            JobStatus::OutlineComplete => JobState::OutlineComplete,
            JobStatus::GeneratingChapters => JobState::GeneratingChapters,
            JobStatus::Complete => JobState::Complete {
                completed_at: completed_at.unwrap_or_else(Utc::now),
            },
            JobStatus::Failed => JobState::Failed {
                error: error.unwrap_or_else(|| "unknown error".to_string()),
            },
            JobStatus::Paused => JobState::Paused,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobState::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobState::Complete { completed_at } => Some(*completed_at),
            _ => None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        JobState::Failed {
            error: error.into(),
        }
    }

    pub fn complete() -> Self {
        JobState::Complete {
            completed_at: Utc::now(),
        }
    }
}

/// 生成任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub book_id: Uuid,
    pub state: JobState,
    /// 最后一个完成的章节号，0 表示尚未完成任何章节
    pub current_chapter: u32,
    pub total_chapters: u32,
    /// 认领该任务的 worker
    pub worker_id: Option<String>,
    /// 认领序号，每次认领加一；写入只对持有最新序号的一方生效
    pub claim_seq: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(book_id: Uuid, total_chapters: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            book_id,
            state: JobState::Pending,
            current_chapter: 0,
            total_chapters,
            worker_id: None,
            claim_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    /// 校验并执行状态迁移
    pub fn transition(&mut self, next: JobState) -> Result<(), TransitionError> {
        let from = self.status();
        let to = next.status();
        if !from.can_transition_to(to) {
            return Err(TransitionError::new("job", from.as_str(), to.as_str()));
        }
        if to == JobStatus::Pending {
            self.worker_id = None;
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 记录章节完成，进度单调不减
    pub fn advance_to(&mut self, chapter: u32) -> Result<(), ProgressError> {
        if self.status() != JobStatus::GeneratingChapters {
            return Err(ProgressError::NotGenerating(self.status().as_str().to_string()));
        }
        if chapter == 0 || chapter > self.total_chapters {
            return Err(ProgressError::OutOfRange {
                requested: chapter,
                total: self.total_chapters,
            });
        }
        if chapter < self.current_chapter {
            return Err(ProgressError::Regression {
                current: self.current_chapter,
                requested: chapter,
            });
        }
        self.current_chapter = chapter;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 进度百分比（0-100）
    pub fn percent(&self) -> u8 {
        if self.total_chapters == 0 {
            return 0;
        }
        if self.status() == JobStatus::Complete {
            return 100;
        }
        ((self.current_chapter as u64 * 100) / self.total_chapters as u64).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut job = GenerationJob::new(Uuid::new_v4(), 2);
        job.transition(JobState::GeneratingOutline).unwrap();
        job.transition(JobState::OutlineComplete).unwrap();
        job.transition(JobState::GeneratingChapters).unwrap();
        job.advance_to(1).unwrap();
        job.advance_to(2).unwrap();
        job.transition(JobState::complete()).unwrap();
        assert_eq!(job.status(), JobStatus::Complete);
        assert_eq!(job.percent(), 100);
        assert!(job.state.completed_at().is_some());
    }

    #[test]
    fn test_rejected_transitions() {
        let mut job = GenerationJob::new(Uuid::new_v4(), 2);
        assert!(job.transition(JobState::complete()).is_err());
        assert!(job.transition(JobState::OutlineComplete).is_err());

        job.transition(JobState::failed("boom")).unwrap();
        assert_eq!(job.error(), Some("boom"));
        assert!(job.transition(JobState::failed("again")).is_err());
        assert!(job.transition(JobState::GeneratingChapters).is_err());
    }

    #[test]
    fn test_requeue_only_from_failed_or_paused() {
        let mut job = GenerationJob::new(Uuid::new_v4(), 1);
        assert!(!job.status().accepts_requeue());
        job.transition(JobState::Paused).unwrap();
        job.transition(JobState::Pending).unwrap();

        job.worker_id = Some("worker-a".to_string());
        job.transition(JobState::GeneratingChapters).unwrap();
        job.transition(JobState::failed("upstream")).unwrap();
        job.transition(JobState::Pending).unwrap();
        assert_eq!(job.worker_id, None);
        assert_eq!(job.error(), None);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = GenerationJob::new(Uuid::new_v4(), 3);
        assert!(matches!(job.advance_to(1), Err(ProgressError::NotGenerating(_))));
        job.transition(JobState::GeneratingChapters).unwrap();
        job.advance_to(2).unwrap();
        assert!(matches!(
            job.advance_to(1),
            Err(ProgressError::Regression { current: 2, requested: 1 })
        ));
        assert!(matches!(
            job.advance_to(4),
            Err(ProgressError::OutOfRange { .. })
        ));
        assert_eq!(job.percent(), 66);
    }

    #[test]
    fn test_status_roundtrip_strings() {
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("bogus"), None);
    }
}
