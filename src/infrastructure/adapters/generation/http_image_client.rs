//! HTTP Image Client - 调用外部图片生成服务
//!
//! 外部 API:
//! POST {base_url}
//! Request: {"model": "...", "prompt": "..."}  (JSON)
//! Response: 图片二进制，用量在 X-Usage-* 头中

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{send_error, usage_from_headers};
use crate::application::ports::{GenerationError, ImageGeneratorPort, ImageOutput};

#[derive(Debug, Serialize)]
struct ImageHttpRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// HTTP 图片客户端配置
#[derive(Debug, Clone)]
pub struct HttpImageClientConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for HttpImageClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8100/v1/image".to_string(),
            api_key: None,
            model: "default".to_string(),
            timeout_secs: 300,
        }
    }
}

/// HTTP 图片客户端
pub struct HttpImageClient {
    client: Client,
    config: HttpImageClientConfig,
}

impl HttpImageClient {
    pub fn new(config: HttpImageClientConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }
}

/// Content-Type 到扩展名
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type.split(';').next().map(str::trim) {
        Some("image/png") => Some("png"),
        Some("image/jpeg") | Some("image/jpg") => Some("jpg"),
        Some("image/webp") => Some("webp"),
        _ => None,
    }
}

#[async_trait]
impl ImageGeneratorPort for HttpImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<ImageOutput, GenerationError> {
        tracing::debug!(url = %self.config.url, prompt_len = prompt.len(), "Sending image generation request");

        let mut request = self.client.post(&self.config.url).json(&ImageHttpRequest {
            model: &self.config.model,
            prompt,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| send_error("image", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let extension = extension_for(&content_type).ok_or_else(|| {
            GenerationError::InvalidResponse(format!("Unsupported image content type: {}", content_type))
        })?;
        let usage = usage_from_headers(response.headers());

        let data = response
            .bytes()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to read image: {}", e)))?
            .to_vec();

        tracing::debug!(size = data.len(), extension, "Image generation completed");

        Ok(ImageOutput {
            data,
            extension: extension.to_string(),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg; charset=binary"), Some("jpg"));
        assert_eq!(extension_for("application/json"), None);
    }
}
