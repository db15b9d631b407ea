//! Generation Context - Errors

use thiserror::Error;

/// 非法状态迁移
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {entity} transition: {from} -> {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

impl TransitionError {
    pub fn new(entity: &'static str, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            entity,
            from: from.into(),
            to: to.into(),
        }
    }
}

/// 进度更新错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("chapter progress cannot move backwards: {current} -> {requested}")]
    Regression { current: u32, requested: u32 },

    #[error("chapter {requested} is outside 1..={total}")]
    OutOfRange { requested: u32, total: u32 },

    #[error("progress can only advance while generating chapters (status: {0})")]
    NotGenerating(String),
}
