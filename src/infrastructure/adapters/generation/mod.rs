//! Generation Adapters - 文本与图片生成服务客户端
//!
//! HTTP 客户端对接外部模型服务，Fake 客户端用于本地运行和测试

mod fake_generators;
mod http_image_client;
mod http_text_client;

pub use fake_generators::{FakeGeneratorScript, FakeImageGenerator, FakeTextGenerator};
pub use http_image_client::{HttpImageClient, HttpImageClientConfig};
pub use http_text_client::{HttpTextClient, HttpTextClientConfig};

use crate::application::ports::GenerationError;
use crate::domain::generation::TokenUsage;

/// reqwest 发送错误映射
pub(crate) fn send_error(service: &str, e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else if e.is_connect() {
        GenerationError::NetworkError(format!("Cannot connect to {} service: {}", service, e))
    } else {
        GenerationError::NetworkError(e.to_string())
    }
}

/// 从响应头读取用量（二进制响应的用量放在头部）
pub(crate) fn usage_from_headers(headers: &reqwest::header::HeaderMap) -> TokenUsage {
    let number = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    TokenUsage {
        prompt_units: number("X-Usage-Prompt-Units").and_then(|v| v.parse().ok()).unwrap_or(0),
        completion_units: number("X-Usage-Completion-Units").and_then(|v| v.parse().ok()).unwrap_or(0),
        cost: number("X-Usage-Cost").and_then(|v| v.parse().ok()).unwrap_or(0.0),
    }
}
