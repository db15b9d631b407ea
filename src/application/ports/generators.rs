//! Generator Ports - 外部生成服务抽象
//!
//! 文本、图片、语音合成都是外部协作者：输入提示词，返回内容和用量
//! 具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::generation::TokenUsage;

/// 外部生成服务错误
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 文本生成结果
#[derive(Debug, Clone)]
pub struct TextOutput {
    pub content: String,
    pub usage: TokenUsage,
}

/// 图片生成结果
#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub data: Vec<u8>,
    /// 文件扩展名（不含点）
    pub extension: String,
    pub usage: TokenUsage,
}

/// 语音合成请求
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub model: String,
}

/// 语音合成结果
#[derive(Debug, Clone)]
pub struct SpeechOutput {
    /// MP3 音频
    pub audio_data: Vec<u8>,
    pub duration_ms: Option<u64>,
}

/// 文本生成
#[async_trait]
pub trait TextGeneratorPort: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<TextOutput, GenerationError>;

    async fn health_check(&self) -> bool {
        true
    }
}

/// 图片生成
#[async_trait]
pub trait ImageGeneratorPort: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<ImageOutput, GenerationError>;
}

/// 语音合成
#[async_trait]
pub trait SpeechSynthesizerPort: Send + Sync {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechOutput, GenerationError>;

    async fn health_check(&self) -> bool {
        true
    }
}
