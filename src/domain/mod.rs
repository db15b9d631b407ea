//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Book Context: 书籍与生成上下文
//! - Generation Context: 生成任务、章节、用量
//! - Audiobook Context: 有声书任务、费用估算、附加音频
//!
//! 以及发布就绪评估和文本工具

pub mod audiobook;
pub mod book;
pub mod generation;
pub mod publish;
pub mod text;

pub use publish::{evaluate, PublishStatus};
