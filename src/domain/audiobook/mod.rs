//! Audiobook Context - 有声书限界上下文
//!
//! 独立于生成任务的生命周期，可针对同一本书多次创建、取消、恢复

mod assets;
mod job;
mod pricing;

pub use assets::{AuxiliaryAsset, AuxiliaryKind};
pub use job::{AudioSegment, AudiobookJob, AudiobookState, AudiobookStatus};
pub use pricing::{billable_characters, estimate, AudiobookEstimate, ChapterEstimate, RateTable};
