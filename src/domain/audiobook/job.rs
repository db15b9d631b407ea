//! Audiobook Context - AudiobookJob
//!
//! 状态机:
//! pending -> generating -> complete
//! pending / generating -> failed | cancelled
//! 终态 -> pending（恢复，保留已有进度）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::generation::TransitionError;

/// 有声书任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudiobookStatus {
    Pending,
    Generating,
    Complete,
    Failed,
    Cancelled,
}

impl AudiobookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudiobookStatus::Pending => "pending",
            AudiobookStatus::Generating => "generating",
            AudiobookStatus::Complete => "complete",
            AudiobookStatus::Failed => "failed",
            AudiobookStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AudiobookStatus::Pending),
            "generating" => Some(AudiobookStatus::Generating),
            "complete" => Some(AudiobookStatus::Complete),
            "failed" => Some(AudiobookStatus::Failed),
            "cancelled" => Some(AudiobookStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AudiobookStatus::Complete | AudiobookStatus::Failed | AudiobookStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: AudiobookStatus) -> bool {
        use AudiobookStatus::*;
        match (self, next) {
            (Pending, Generating | Failed | Cancelled) => true,
            (Generating, Complete | Failed | Cancelled) => true,
            (from, Pending) => from.is_terminal(),
            _ => false,
        }
    }
}

/// 有声书任务状态（带状态数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AudiobookState {
    Pending,
    Generating,
    Complete { completed_at: DateTime<Utc> },
    Failed { error: String },
    Cancelled { cancelled_at: DateTime<Utc> },
}

impl AudiobookState {
    pub fn status(&self) -> AudiobookStatus {
        match self {
            AudiobookState::Pending => AudiobookStatus::Pending,
            AudiobookState::Generating => AudiobookStatus::Generating,
            AudiobookState::Complete { .. } => AudiobookStatus::Complete,
            AudiobookState::Failed { .. } => AudiobookStatus::Failed,
            AudiobookState::Cancelled { .. } => AudiobookStatus::Cancelled,
        }
    }

    /// 从存储的扁平字段重建
    pub fn from_parts(
        status: AudiobookStatus,
        error: Option<String>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Self {
        match status {
            AudiobookStatus::Pending => AudiobookState::Pending,
            AudiobookStatus::Generating => AudiobookState::Generating,
            AudiobookStatus::Complete => AudiobookState::Complete {
                completed_at: finished_at.unwrap_or_else(Utc::now),
            },
            AudiobookStatus::Failed => AudiobookState::Failed {
                error: error.unwrap_or_else(|| "unknown error".to_string()),
            },
            AudiobookStatus::Cancelled => AudiobookState::Cancelled {
                cancelled_at: finished_at.unwrap_or_else(Utc::now),
            },
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AudiobookState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// 完成或取消时间
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            AudiobookState::Complete { completed_at } => Some(*completed_at),
            AudiobookState::Cancelled { cancelled_at } => Some(*cancelled_at),
            _ => None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        AudiobookState::Failed {
            error: error.into(),
        }
    }

    pub fn complete() -> Self {
        AudiobookState::Complete {
            completed_at: Utc::now(),
        }
    }

    pub fn cancelled() -> Self {
        AudiobookState::Cancelled {
            cancelled_at: Utc::now(),
        }
    }
}

/// 单章音频（progress 中存在即表示该章已有音频）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub url: String,
    pub characters: u64,
    pub cost: f64,
    pub completed_at: DateTime<Utc>,
}

/// 有声书任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudiobookJob {
    pub id: Uuid,
    pub book_id: Uuid,
    pub voice: String,
    pub model: String,
    pub state: AudiobookState,
    pub progress: BTreeMap<u32, AudioSegment>,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    /// 最近一个合成完成的章节号
    pub current_chapter: u32,
    pub force_regenerate: bool,
    /// 认领序号，每次认领加一
    pub claim_seq: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AudiobookJob {
    pub fn new(
        book_id: Uuid,
        voice: impl Into<String>,
        model: impl Into<String>,
        estimated_cost: f64,
        force_regenerate: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            book_id,
            voice: voice.into(),
            model: model.into(),
            state: AudiobookState::Pending,
            progress: BTreeMap::new(),
            estimated_cost,
            actual_cost: 0.0,
            current_chapter: 0,
            force_regenerate,
            claim_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> AudiobookStatus {
        self.state.status()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    pub fn transition(&mut self, next: AudiobookState) -> Result<(), TransitionError> {
        let from = self.status();
        let to = next.status();
        if !from.can_transition_to(to) {
            return Err(TransitionError::new("audiobook", from.as_str(), to.as_str()));
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 恢复一个终态任务，保留已有进度
    ///
    /// 非强制恢复时 current_chapter 指向已有音频的最大章节号，强制重做从头计
    pub fn resume(&mut self, estimated_cost: f64, force_regenerate: bool) -> Result<(), TransitionError> {
        self.transition(AudiobookState::Pending)?;
        self.estimated_cost = estimated_cost;
        self.force_regenerate = force_regenerate;
        self.current_chapter = if force_regenerate {
            0
        } else {
            self.progress.keys().next_back().copied().unwrap_or(0)
        };
        Ok(())
    }

    /// 该章是否需要合成
    pub fn needs_synthesis(&self, chapter: u32) -> bool {
        self.force_regenerate || !self.progress.contains_key(&chapter)
    }

    /// 记录单章结果，覆盖已有条目
    pub fn record_segment(&mut self, chapter: u32, segment: AudioSegment) {
        self.actual_cost += segment.cost;
        self.progress.insert(chapter, segment);
        self.current_chapter = chapter;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(cost: f64) -> AudioSegment {
        AudioSegment {
            url: "/artifacts/audio/1.mp3".to_string(),
            characters: 100,
            cost,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_lifecycle_and_resume() {
        let mut job = AudiobookJob::new(Uuid::new_v4(), "alloy", "tts-1", 1.5, false);
        assert!(job.transition(AudiobookState::complete()).is_err());
        job.transition(AudiobookState::Generating).unwrap();
        job.record_segment(1, segment(0.5));
        job.transition(AudiobookState::cancelled()).unwrap();
        assert!(job.state.finished_at().is_some());

        job.resume(1.5, false).unwrap();
        assert_eq!(job.status(), AudiobookStatus::Pending);
        assert!(job.progress.contains_key(&1));
        assert!(!job.needs_synthesis(1));
        assert!(job.needs_synthesis(2));
    }

    #[test]
    fn test_resume_keeps_current_chapter_at_last_segment() {
        let mut job = AudiobookJob::new(Uuid::new_v4(), "alloy", "tts-1", 1.0, false);
        job.transition(AudiobookState::Generating).unwrap();
        job.record_segment(1, segment(0.1));
        job.record_segment(2, segment(0.1));
        job.transition(AudiobookState::failed("speech timeout")).unwrap();

        job.resume(1.0, false).unwrap();
        assert_eq!(job.current_chapter, 2);

        job.transition(AudiobookState::cancelled()).unwrap();
        job.resume(1.0, true).unwrap();
        assert_eq!(job.current_chapter, 0);
        assert_eq!(job.progress.len(), 2);
    }

    #[test]
    fn test_force_regenerate_overrides_progress() {
        let mut job = AudiobookJob::new(Uuid::new_v4(), "alloy", "tts-1", 0.0, true);
        job.record_segment(1, segment(0.25));
        assert!(job.needs_synthesis(1));
    }

    #[test]
    fn test_record_segment_accumulates_cost() {
        let mut job = AudiobookJob::new(Uuid::new_v4(), "alloy", "tts-1", 0.0, false);
        job.record_segment(1, segment(0.25));
        job.record_segment(1, segment(0.25));
        assert!((job.actual_cost - 0.5).abs() < f64::EPSILON);
        assert_eq!(job.progress.len(), 1);
        assert_eq!(job.current_chapter, 1);
    }

    #[test]
    fn test_cannot_resume_active_job() {
        let mut job = AudiobookJob::new(Uuid::new_v4(), "alloy", "tts-1", 0.0, false);
        assert!(job.resume(0.0, false).is_err());
        job.transition(AudiobookState::Generating).unwrap();
        assert!(job.resume(0.0, false).is_err());
    }
}
