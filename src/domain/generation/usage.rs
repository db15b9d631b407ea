//! Generation Context - Token Usage
//!
//! 用量按步骤追加写入，读取时汇总

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 产生用量的生成步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStep {
    Outline,
    ChapterText,
    ImagePrompt,
    ChapterImage,
    CoverPrompt,
    CoverImage,
}

impl UsageStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStep::Outline => "outline",
            UsageStep::ChapterText => "chapter_text",
            UsageStep::ImagePrompt => "image_prompt",
            UsageStep::ChapterImage => "chapter_image",
            UsageStep::CoverPrompt => "cover_prompt",
            UsageStep::CoverImage => "cover_image",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "outline" => Some(UsageStep::Outline),
            "chapter_text" => Some(UsageStep::ChapterText),
            "image_prompt" => Some(UsageStep::ImagePrompt),
            "chapter_image" => Some(UsageStep::ChapterImage),
            "cover_prompt" => Some(UsageStep::CoverPrompt),
            "cover_image" => Some(UsageStep::CoverImage),
            _ => None,
        }
    }
}

/// 一次外部调用的用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_units: u64,
    pub completion_units: u64,
    pub cost: f64,
}

impl TokenUsage {
    pub fn total_units(&self) -> u64 {
        self.prompt_units + self.completion_units
    }
}

/// 用量记录（追加写入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub id: Uuid,
    pub book_id: Uuid,
    pub job_id: Option<Uuid>,
    pub chapter_number: Option<u32>,
    pub step: UsageStep,
    pub usage: TokenUsage,
    pub created_at: DateTime<Utc>,
}

impl UsageEntry {
    pub fn new(
        book_id: Uuid,
        job_id: Option<Uuid>,
        chapter_number: Option<u32>,
        step: UsageStep,
        usage: TokenUsage,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            job_id,
            chapter_number,
            step,
            usage,
            created_at: Utc::now(),
        }
    }
}

/// 单个步骤的汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepUsage {
    pub calls: u32,
    pub units: u64,
    pub cost: f64,
}

/// 任务用量汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total_units: u64,
    pub total_cost: f64,
    pub by_step: BTreeMap<UsageStep, StepUsage>,
}

impl UsageSummary {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a UsageEntry>) -> Self {
        let mut summary = UsageSummary::default();
        for entry in entries {
            summary.total_units += entry.usage.total_units();
            summary.total_cost += entry.usage.cost;
            let step = summary.by_step.entry(entry.step).or_default();
            step.calls += 1;
            step.units += entry.usage.total_units();
            step.cost += entry.usage.cost;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_groups_by_step() {
        let book_id = Uuid::new_v4();
        let usage = |p, c, cost| TokenUsage {
            prompt_units: p,
            completion_units: c,
            cost,
        };
        let entries = vec![
            UsageEntry::new(book_id, None, None, UsageStep::Outline, usage(10, 90, 0.5)),
            UsageEntry::new(book_id, None, Some(1), UsageStep::ChapterText, usage(20, 180, 1.0)),
            UsageEntry::new(book_id, None, Some(2), UsageStep::ChapterText, usage(20, 180, 1.0)),
        ];

        let summary = UsageSummary::from_entries(&entries);
        assert_eq!(summary.total_units, 500);
        assert!((summary.total_cost - 2.5).abs() < f64::EPSILON);
        let text = &summary.by_step[&UsageStep::ChapterText];
        assert_eq!(text.calls, 2);
        assert_eq!(text.units, 400);
    }
}
