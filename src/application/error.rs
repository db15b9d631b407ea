//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{
    ArtifactStoreError, CreditError, GenerationError, PackagingError, RepositoryError,
};
use crate::domain::book::BookError;
use crate::domain::generation::{ProgressError, TransitionError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 请求不合法，未发生任何状态变更
    #[error("Validation error: {0}")]
    Validation(String),

    /// 该书已有未结束的任务
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 当前状态不允许该操作
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// 额度不足
    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: u32, available: u32 },

    /// 外部生成服务失败
    #[error("Upstream generation failure: {0}")]
    UpstreamGeneration(String),

    /// 未就绪且未强制发布
    #[error("Book is not ready to publish ({} issues)", issues.len())]
    NotReady { issues: Vec<String> },

    /// 无权限
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    Repository(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 创建冲突错误
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound {
                resource_type: "Record",
                id,
            },
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::InvalidTransition(msg) | RepositoryError::StaleState(msg) => {
                Self::InvalidTransition(msg)
            }
            other => Self::Repository(other.to_string()),
        }
    }
}

impl From<TransitionError> for ApplicationError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidTransition(err.to_string())
    }
}

impl From<ProgressError> for ApplicationError {
    fn from(err: ProgressError) -> Self {
        Self::InvalidTransition(err.to_string())
    }
}

impl From<BookError> for ApplicationError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Transition(e) => Self::InvalidTransition(e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<GenerationError> for ApplicationError {
    fn from(err: GenerationError) -> Self {
        Self::UpstreamGeneration(err.to_string())
    }
}

impl From<PackagingError> for ApplicationError {
    fn from(err: PackagingError) -> Self {
        Self::UpstreamGeneration(err.to_string())
    }
}

impl From<ArtifactStoreError> for ApplicationError {
    fn from(err: ArtifactStoreError) -> Self {
        match err {
            ArtifactStoreError::NotFound(key) => Self::NotFound {
                resource_type: "Artifact",
                id: key,
            },
            ArtifactStoreError::InvalidKey(key) => Self::Validation(format!("invalid artifact key: {}", key)),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<CreditError> for ApplicationError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::Insufficient {
                required,
                available,
                ..
            } => Self::InsufficientCredits {
                required,
                available,
            },
            other => Self::Internal(other.to_string()),
        }
    }
}
