//! Worker Layer - 后台任务处理
//!
//! - GenerationWorker: 认领生成任务，驱动大纲、章节流水线与封面
//! - AudiobookWorker: 认领有声书任务，按章节合成音频

mod audiobook_worker;
mod chapter_pipeline;
mod generation_worker;
mod prompts;

pub use audiobook_worker::{
    AudiobookOrchestrator, AudiobookOutcome, AudiobookWorker, AudiobookWorkerConfig,
};
pub use chapter_pipeline::{ChapterPipeline, ChapterPipelineConfig};
pub use generation_worker::{
    GenerationCollaborators, GenerationScheduler, GenerationWorker, GenerationWorkerConfig,
    HEARTBEAT_EXPIRED,
};
