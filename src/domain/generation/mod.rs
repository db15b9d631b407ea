//! Generation Context - 生成限界上下文
//!
//! 职责:
//! - GenerationJob 状态机
//! - Chapter 子状态机
//! - 用量记录与汇总

mod chapter;
mod errors;
mod job;
mod usage;

pub use chapter::{Chapter, ChapterFailure, ChapterMetadata, ChapterStatus, ChapterStep};
pub use errors::{ProgressError, TransitionError};
pub use job::{GenerationJob, JobState, JobStatus};
pub use usage::{StepUsage, TokenUsage, UsageEntry, UsageStep, UsageSummary};
