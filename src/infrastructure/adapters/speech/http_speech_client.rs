//! HTTP Speech Client - 调用外部语音合成服务
//!
//! 外部 API:
//! POST {base_url}/v1/audio/speech
//! Request: {"model": "...", "voice": "...", "input": "...", "response_format": "mp3"}  (JSON)
//! Response: audio/mpeg binary, 时长在 X-Audio-Duration-Ms 头中

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{GenerationError, SpeechOutput, SpeechRequest, SpeechSynthesizerPort};
use crate::infrastructure::adapters::generation::send_error;

#[derive(Debug, Serialize)]
struct SpeechHttpRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

/// HTTP 语音合成客户端配置
#[derive(Debug, Clone)]
pub struct HttpSpeechClientConfig {
    /// 服务基础 URL
    pub base_url: String,
    pub api_key: Option<String>,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpSpeechClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8200".to_string(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

impl HttpSpeechClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
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

/// HTTP 语音合成客户端
pub struct HttpSpeechClient {
    client: Client,
    config: HttpSpeechClientConfig,
}

impl HttpSpeechClient {
    pub fn new(config: HttpSpeechClientConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn speech_url(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url.trim_end_matches('/'))
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechSynthesizerPort for HttpSpeechClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechOutput, GenerationError> {
        tracing::debug!(
            url = %self.speech_url(),
            text_len = request.text.len(),
            voice = %request.voice,
            model = %request.model,
            "Sending speech synthesis request"
        );

        let mut http_request = self.client.post(self.speech_url()).json(&SpeechHttpRequest {
            model: &request.model,
            voice: &request.voice,
            input: &request.text,
            response_format: "mp3",
        });
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await.map_err(|e| send_error("speech", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let duration_ms = response
            .headers()
            .get("X-Audio-Duration-Ms")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to read audio: {}", e)))?
            .to_vec();

        if audio_data.is_empty() {
            return Err(GenerationError::InvalidResponse("Empty audio body".to_string()));
        }

        tracing::info!(
            duration_ms = ?duration_ms,
            audio_size = audio_data.len(),
            "Speech synthesis completed"
        );

        Ok(SpeechOutput { audio_data, duration_ms })
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let client = HttpSpeechClient::new(HttpSpeechClientConfig::new("http://tts:8200/")).unwrap();
        assert_eq!(client.speech_url(), "http://tts:8200/v1/audio/speech");
        assert_eq!(client.health_url(), "http://tts:8200/health");
    }

    #[test]
    fn test_config_default() {
        let config = HttpSpeechClientConfig::default().with_timeout(30);
        assert_eq!(config.base_url, "http://localhost:8200");
        assert_eq!(config.timeout_secs, 30);
    }
}
