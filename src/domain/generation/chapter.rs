//! Generation Context - Chapter
//!
//! 章节状态不单独存储含义，而是由已填充的字段推导：
//! 失败 > 进行中步骤 > 已完成 > 已有插图提示词 > 已有正文 > 待生成

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UsageEntry;
use crate::domain::text::{extract_keywords, word_count};

/// 章节状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Pending,
    GeneratingText,
    TextComplete,
    GeneratingImagePrompt,
    ImagePromptReady,
    GeneratingImage,
    Complete,
    Failed,
}

impl ChapterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterStatus::Pending => "pending",
            ChapterStatus::GeneratingText => "generating_text",
            ChapterStatus::TextComplete => "text_complete",
            ChapterStatus::GeneratingImagePrompt => "generating_image_prompt",
            ChapterStatus::ImagePromptReady => "image_prompt_ready",
            ChapterStatus::GeneratingImage => "generating_image",
            ChapterStatus::Complete => "complete",
            ChapterStatus::Failed => "failed",
        }
    }
}

/// 章节流水线步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStep {
    Text,
    ImagePrompt,
    Image,
}

impl ChapterStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterStep::Text => "text",
            ChapterStep::ImagePrompt => "image_prompt",
            ChapterStep::Image => "image",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ChapterStep::Text),
            "image_prompt" => Some(ChapterStep::ImagePrompt),
            "image" => Some(ChapterStep::Image),
            _ => None,
        }
    }

    fn in_flight_status(&self) -> ChapterStatus {
        match self {
            ChapterStep::Text => ChapterStatus::GeneratingText,
            ChapterStep::ImagePrompt => ChapterStatus::GeneratingImagePrompt,
            ChapterStep::Image => ChapterStatus::GeneratingImage,
        }
    }
}

/// 最后一次失败的步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFailure {
    pub step: ChapterStep,
    pub error: String,
}

/// 章节元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMetadata {
    pub word_count: usize,
    pub keywords: Vec<String>,
}

impl ChapterMetadata {
    pub fn from_text(text: &str) -> Self {
        Self {
            word_count: word_count(text),
            keywords: extract_keywords(text, 5),
        }
    }
}

/// 章节，以 (book_id, number) 为键
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub book_id: Uuid,
    pub number: u32,
    pub title: String,
    pub text_prompt: Option<String>,
    pub text: Option<String>,
    pub image_prompt: Option<String>,
    pub image_url: Option<String>,
    pub metadata: ChapterMetadata,
    pub in_flight: Option<ChapterStep>,
    pub failure: Option<ChapterFailure>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 每个生成步骤一条，只读（由用量表汇总加载）
    #[serde(default)]
    pub token_usage: Vec<UsageEntry>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    pub fn new(book_id: Uuid, number: u32, title: impl Into<String>) -> Self {
        Self {
            book_id,
            number,
            title: title.into(),
            text_prompt: None,
            text: None,
            image_prompt: None,
            image_url: None,
            metadata: ChapterMetadata::default(),
            in_flight: None,
            failure: None,
            completed_at: None,
            token_usage: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn status(&self) -> ChapterStatus {
        if self.failure.is_some() {
            return ChapterStatus::Failed;
        }
        if let Some(step) = self.in_flight {
            return step.in_flight_status();
        }
        if self.completed_at.is_some() {
            return ChapterStatus::Complete;
        }
        if self.image_prompt.is_some() {
            return ChapterStatus::ImagePromptReady;
        }
        if self.text.is_some() {
            return ChapterStatus::TextComplete;
        }
        ChapterStatus::Pending
    }

    pub fn is_complete(&self) -> bool {
        self.status() == ChapterStatus::Complete
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// 开始某个步骤，清除上一次失败
    pub fn begin(&mut self, step: ChapterStep) {
        self.failure = None;
        self.in_flight = Some(step);
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, step: ChapterStep, error: impl Into<String>) {
        self.in_flight = None;
        self.failure = Some(ChapterFailure {
            step,
            error: error.into(),
        });
        self.updated_at = Utc::now();
    }

    pub fn record_text(&mut self, prompt: String, text: String) {
        self.metadata = ChapterMetadata::from_text(&text);
        self.text_prompt = Some(prompt);
        self.text = Some(text);
        self.finish_step();
    }

    pub fn record_image_prompt(&mut self, prompt: String) {
        self.image_prompt = Some(prompt);
        self.finish_step();
    }

    pub fn record_image(&mut self, url: String) {
        self.image_url = Some(url);
        self.finish_step();
    }

    pub fn mark_complete(&mut self) {
        self.in_flight = None;
        self.failure = None;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// 用户直接修改正文，不重开流水线
    pub fn edit_text(&mut self, text: String) {
        self.metadata = ChapterMetadata::from_text(&text);
        self.text = Some(text);
        self.updated_at = Utc::now();
    }

    pub fn edit_text_prompt(&mut self, prompt: String) {
        self.text_prompt = Some(prompt);
        self.updated_at = Utc::now();
    }

    pub fn edit_image_prompt(&mut self, prompt: String) {
        self.image_prompt = Some(prompt);
        self.updated_at = Utc::now();
    }

    pub fn set_image_url(&mut self, url: String) {
        self.image_url = Some(url);
        self.updated_at = Utc::now();
    }

    fn finish_step(&mut self) {
        self.in_flight = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter() -> Chapter {
        Chapter::new(Uuid::new_v4(), 1, "Opening")
    }

    #[test]
    fn test_status_follows_populated_fields() {
        let mut ch = chapter();
        assert_eq!(ch.status(), ChapterStatus::Pending);

        ch.begin(ChapterStep::Text);
        assert_eq!(ch.status(), ChapterStatus::GeneratingText);

        ch.record_text("prompt".into(), "Some words here".into());
        assert_eq!(ch.status(), ChapterStatus::TextComplete);
        assert_eq!(ch.metadata.word_count, 3);

        ch.begin(ChapterStep::ImagePrompt);
        assert_eq!(ch.status(), ChapterStatus::GeneratingImagePrompt);
        ch.record_image_prompt("a lighthouse at dusk".into());
        assert_eq!(ch.status(), ChapterStatus::ImagePromptReady);

        ch.begin(ChapterStep::Image);
        assert_eq!(ch.status(), ChapterStatus::GeneratingImage);
        ch.record_image("/artifacts/1.png".into());
        ch.mark_complete();
        assert_eq!(ch.status(), ChapterStatus::Complete);
    }

    #[test]
    fn test_failure_overrides_and_clears_on_retry() {
        let mut ch = chapter();
        ch.begin(ChapterStep::Text);
        ch.fail(ChapterStep::Text, "upstream timeout");
        assert_eq!(ch.status(), ChapterStatus::Failed);
        assert_eq!(ch.in_flight, None);

        ch.begin(ChapterStep::Text);
        assert_eq!(ch.status(), ChapterStatus::GeneratingText);
        assert!(ch.failure.is_none());
    }

    #[test]
    fn test_edits_do_not_reopen_completed_chapter() {
        let mut ch = chapter();
        ch.record_text("p".into(), "first draft".into());
        ch.mark_complete();

        ch.edit_text("a much better second draft".into());
        ch.edit_image_prompt("new prompt".into());
        ch.set_image_url("/artifacts/upload.png".into());
        assert_eq!(ch.status(), ChapterStatus::Complete);
        assert_eq!(ch.metadata.word_count, 5);
    }

    #[test]
    fn test_blank_text_is_not_text() {
        let mut ch = chapter();
        ch.edit_text("   ".into());
        assert!(!ch.has_text());
        assert!(!ch.has_image());
    }
}
