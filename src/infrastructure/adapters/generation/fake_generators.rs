//! Fake Generators - 确定性的文本/图片生成器
//!
//! 不调用外部服务，用于本地运行和编排测试
//! 通过 `FakeGeneratorScript` 按提示词内容注入失败

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::application::ports::{
    GenerationError, ImageGeneratorPort, ImageOutput, TextGeneratorPort, TextOutput,
};
use crate::domain::generation::TokenUsage;

/// 大纲提示词中声明章节数的行
const CHAPTER_COUNT_LABEL: &str = "Number of chapters:";

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// 失败脚本与调用记录，可在多个 fake 之间共享
#[derive(Debug, Default)]
pub struct FakeGeneratorScript {
    fail_markers: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGeneratorScript {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 提示词包含 `marker` 的调用返回 ServiceError
    pub fn fail_when_prompt_contains(&self, marker: impl Into<String>) {
        lock(&self.fail_markers).push(marker.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.fail_markers).clear();
    }

    /// 已收到的提示词（包含失败的调用）
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn count_prompts_containing(&self, needle: &str) -> usize {
        lock(&self.prompts).iter().filter(|p| p.contains(needle)).count()
    }

    pub(crate) fn check(&self, prompt: &str) -> Result<(), GenerationError> {
        lock(&self.prompts).push(prompt.to_string());
        let markers = lock(&self.fail_markers);
        match markers.iter().find(|m| prompt.contains(m.as_str())) {
            Some(marker) => Err(GenerationError::ServiceError(format!(
                "scripted failure for prompt containing '{}'",
                marker
            ))),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fake_usage(prompt: &str, output: &str, rate: f64) -> TokenUsage {
    let prompt_units = prompt.split_whitespace().count() as u64;
    let completion_units = output.split_whitespace().count() as u64;
    TokenUsage {
        prompt_units,
        completion_units,
        cost: (prompt_units + completion_units) as f64 * rate,
    }
}

/// Fake 文本生成器
pub struct FakeTextGenerator {
    script: Arc<FakeGeneratorScript>,
}

impl FakeTextGenerator {
    pub fn new(script: Arc<FakeGeneratorScript>) -> Self {
        Self { script }
    }

    fn outline(count: u32) -> String {
        (1..=count)
            .map(|n| format!("{}. Part {}: What happens in part {}.", n, n, n))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn requested_chapters(prompt: &str) -> Option<u32> {
        prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix(CHAPTER_COUNT_LABEL))
            .and_then(|rest| rest.trim().parse().ok())
    }
}

#[async_trait]
impl TextGeneratorPort for FakeTextGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<TextOutput, GenerationError> {
        self.script.check(prompt)?;

        let content = match Self::requested_chapters(prompt) {
            Some(count) => Self::outline(count),
            None => {
                let first_line = prompt.lines().next().unwrap_or_default().trim();
                format!(
                    "{}\n\nThe morning opened slowly. Every detail settled into place before the next turn.",
                    first_line
                )
            }
        };

        tracing::debug!(prompt_len = prompt.len(), "FakeTextGenerator: returning scripted text");

        Ok(TextOutput {
            usage: fake_usage(prompt, &content, 0.00002),
            content,
        })
    }
}

/// Fake 图片生成器，返回带 PNG 签名的字节
pub struct FakeImageGenerator {
    script: Arc<FakeGeneratorScript>,
}

impl FakeImageGenerator {
    pub fn new(script: Arc<FakeGeneratorScript>) -> Self {
        Self { script }
    }
}

#[async_trait]
impl ImageGeneratorPort for FakeImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<ImageOutput, GenerationError> {
        self.script.check(prompt)?;

        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(prompt.as_bytes());

        Ok(ImageOutput {
            data,
            extension: "png".to_string(),
            usage: TokenUsage {
                prompt_units: prompt.split_whitespace().count() as u64,
                completion_units: 0,
                cost: 0.04,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::text::parse_outline;

    #[tokio::test]
    async fn test_outline_prompt_yields_parseable_outline() {
        let generator = FakeTextGenerator::new(FakeGeneratorScript::new());
        let output = generator
            .generate_text("Write an outline.\nNumber of chapters: 4\n")
            .await
            .unwrap();
        let entries = parse_outline(&output.content);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].title, "Part 4");
        assert!(output.usage.cost > 0.0);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let script = FakeGeneratorScript::new();
        let text = FakeTextGenerator::new(script.clone());
        let image = FakeImageGenerator::new(script.clone());

        script.fail_when_prompt_contains("Chapter 3:");
        assert!(text.generate_text("Chapter 2: Calm").await.is_ok());
        assert!(matches!(
            text.generate_text("Chapter 3: Storm").await,
            Err(GenerationError::ServiceError(_))
        ));
        assert!(image.generate_image("Chapter 3: Storm at sea").await.is_err());

        script.clear_failures();
        assert!(text.generate_text("Chapter 3: Storm").await.is_ok());
        assert_eq!(script.count_prompts_containing("Chapter 3:"), 3);
    }
}
