//! Audiobook Context - 附加音频
//!
//! 片头、片尾、试听片段是一次性合成，不计入 progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::text::excerpt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryKind {
    OpeningCredits,
    ClosingCredits,
    RetailSample,
}

impl AuxiliaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuxiliaryKind::OpeningCredits => "opening_credits",
            AuxiliaryKind::ClosingCredits => "closing_credits",
            AuxiliaryKind::RetailSample => "retail_sample",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "opening_credits" => Some(AuxiliaryKind::OpeningCredits),
            "closing_credits" => Some(AuxiliaryKind::ClosingCredits),
            "retail_sample" => Some(AuxiliaryKind::RetailSample),
            _ => None,
        }
    }

    /// 生成朗读脚本
    ///
    /// 试听片段取第一章开头，无正文时返回 None
    pub fn script(
        &self,
        title: &str,
        voice: &str,
        first_chapter_text: Option<&str>,
        sample_characters: usize,
    ) -> Option<String> {
        match self {
            AuxiliaryKind::OpeningCredits => Some(format!("{}. Narrated by {}.", title, voice)),
            AuxiliaryKind::ClosingCredits => Some(format!(
                "This has been {}. Thank you for listening.",
                title
            )),
            AuxiliaryKind::RetailSample => first_chapter_text
                .map(|text| excerpt(text, sample_characters))
                .filter(|sample| !sample.is_empty()),
        }
    }

    /// 存储路径
    pub fn storage_key(&self, book_id: Uuid) -> String {
        format!("audio/{}/{}.mp3", book_id, self.as_str())
    }
}

/// 已生成的附加音频
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryAsset {
    pub book_id: Uuid,
    pub kind: AuxiliaryKind,
    pub voice: String,
    pub model: String,
    pub url: String,
    pub characters: u64,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_scripts() {
        let opening = AuxiliaryKind::OpeningCredits.script("Tides", "alloy", None, 100);
        assert_eq!(opening.as_deref(), Some("Tides. Narrated by alloy."));
        let closing = AuxiliaryKind::ClosingCredits.script("Tides", "alloy", None, 100);
        assert_eq!(
            closing.as_deref(),
            Some("This has been Tides. Thank you for listening.")
        );
    }

    #[test]
    fn test_retail_sample_needs_text() {
        let kind = AuxiliaryKind::RetailSample;
        assert_eq!(kind.script("Tides", "alloy", None, 100), None);
        assert_eq!(kind.script("Tides", "alloy", Some("  "), 100), None);
        assert_eq!(
            kind.script("Tides", "alloy", Some("One. Two. Three."), 10).as_deref(),
            Some("One. Two.")
        );
    }

    #[test]
    fn test_storage_key() {
        let id = Uuid::nil();
        assert_eq!(
            AuxiliaryKind::RetailSample.storage_key(id),
            format!("audio/{}/retail_sample.mp3", id)
        );
    }
}
