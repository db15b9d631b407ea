//! HTTP Text Client - 调用外部文本生成服务
//!
//! 外部 API:
//! POST {base_url}
//! Request: {"model": "...", "prompt": "..."}  (JSON)
//! Response: {"content": "...", "usage": {"prompt_units": 0, "completion_units": 0, "cost": 0.0}}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::send_error;
use crate::application::ports::{GenerationError, TextGeneratorPort, TextOutput};
use crate::domain::generation::TokenUsage;

#[derive(Debug, Serialize)]
struct TextHttpRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct TextHttpResponse {
    content: String,
    #[serde(default)]
    usage: TokenUsage,
}

/// HTTP 文本客户端配置
#[derive(Debug, Clone)]
pub struct HttpTextClientConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for HttpTextClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8100/v1/text".to_string(),
            api_key: None,
            model: "default".to_string(),
            timeout_secs: 300,
        }
    }
}

impl HttpTextClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 文本客户端
pub struct HttpTextClient {
    client: Client,
    config: HttpTextClientConfig,
}

impl HttpTextClient {
    pub fn new(config: HttpTextClientConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextGeneratorPort for HttpTextClient {
    async fn generate_text(&self, prompt: &str) -> Result<TextOutput, GenerationError> {
        tracing::debug!(
            url = %self.config.url,
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending text generation request"
        );

        let mut request = self.client.post(&self.config.url).json(&TextHttpRequest {
            model: &self.config.model,
            prompt,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| send_error("text", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let body: TextHttpResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to parse text response: {}", e)))?;

        if body.content.trim().is_empty() {
            return Err(GenerationError::InvalidResponse("Empty text content".to_string()));
        }

        tracing::debug!(
            content_len = body.content.len(),
            units = body.usage.total_units(),
            "Text generation completed"
        );

        Ok(TextOutput {
            content: body.content,
            usage: body.usage,
        })
    }

    async fn health_check(&self) -> bool {
        self.client
            .head(&self.config.url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| !r.status().is_server_error())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HttpTextClientConfig::new("http://llm:9000/generate")
            .with_model("writer-large")
            .with_api_key(Some(String::new()))
            .with_timeout(60);
        assert_eq!(config.url, "http://llm:9000/generate");
        assert_eq!(config.model, "writer-large");
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_response_usage_defaults() {
        let body: TextHttpResponse = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert_eq!(body.usage, TokenUsage::default());
    }
}
