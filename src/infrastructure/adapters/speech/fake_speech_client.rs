//! Fake Speech Synthesizer - 用于测试的语音合成器
//!
//! 不调用外部服务，返回以 ID3 头开始的固定字节

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::ports::{GenerationError, SpeechOutput, SpeechRequest, SpeechSynthesizerPort};
use crate::infrastructure::adapters::generation::FakeGeneratorScript;

/// 每个字符的模拟时长
const MS_PER_CHARACTER: u64 = 60;

/// Fake Speech Synthesizer
pub struct FakeSpeechSynthesizer {
    script: Arc<FakeGeneratorScript>,
}

impl FakeSpeechSynthesizer {
    pub fn new(script: Arc<FakeGeneratorScript>) -> Self {
        Self { script }
    }
}

#[async_trait]
impl SpeechSynthesizerPort for FakeSpeechSynthesizer {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechOutput, GenerationError> {
        self.script.check(&request.text)?;

        tracing::debug!(
            text_len = request.text.len(),
            voice = %request.voice,
            model = %request.model,
            "FakeSpeechSynthesizer: returning fixed audio"
        );

        let mut audio_data = b"ID3".to_vec();
        audio_data.extend_from_slice(request.voice.as_bytes());
        audio_data.extend_from_slice(&(request.text.len() as u32).to_be_bytes());

        Ok(SpeechOutput {
            audio_data,
            duration_ms: Some(request.text.chars().count() as u64 * MS_PER_CHARACTER),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_audio_and_scripted_failure() {
        let script = FakeGeneratorScript::new();
        let synth = FakeSpeechSynthesizer::new(script.clone());
        let request = |text: &str| SpeechRequest {
            text: text.to_string(),
            voice: "alloy".into(),
            model: "tts-1".into(),
        };

        let output = synth.synthesize(request("Hello there")).await.unwrap();
        assert!(output.audio_data.starts_with(b"ID3"));
        assert_eq!(output.duration_ms, Some(660));

        script.fail_when_prompt_contains("storm");
        assert!(synth.synthesize(request("A storm rolled in")).await.is_err());
    }
}
