//! Audiobook Context - 费用估算
//!
//! 估算是纯函数：只依赖章节正文长度和费率表

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::generation::Chapter;

/// 模型费率表（每字符费用）
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl RateTable {
    pub fn new(rates: HashMap<String, f64>) -> Self {
        Self { rates }
    }

    pub fn rate(&self, model: &str) -> Option<f64> {
        self.rates.get(model).copied()
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(|k| k.as_str())
    }
}

/// 单章估算
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterEstimate {
    pub chapter_number: u32,
    pub characters: u64,
    pub cost: f64,
}

/// 整书估算
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudiobookEstimate {
    pub model: String,
    pub rate_per_character: f64,
    pub total_characters: u64,
    pub estimated_cost: f64,
    pub chapters: Vec<ChapterEstimate>,
}

/// 计费字符数
pub fn billable_characters(text: &str) -> u64 {
    text.chars().count() as u64
}

/// 按章节号升序估算，跳过无正文的章节
pub fn estimate(chapters: &[Chapter], model: &str, rate_per_character: f64) -> AudiobookEstimate {
    let mut ordered: Vec<&Chapter> = chapters.iter().filter(|c| c.has_text()).collect();
    ordered.sort_by_key(|c| c.number);

    let breakdown: Vec<ChapterEstimate> = ordered
        .into_iter()
        .map(|chapter| {
            let characters = billable_characters(chapter.text.as_deref().unwrap_or_default());
            ChapterEstimate {
                chapter_number: chapter.number,
                characters,
                cost: characters as f64 * rate_per_character,
            }
        })
        .collect();

    AudiobookEstimate {
        model: model.to_string(),
        rate_per_character,
        total_characters: breakdown.iter().map(|c| c.characters).sum(),
        estimated_cost: breakdown.iter().map(|c| c.cost).sum(),
        chapters: breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chapter(book_id: Uuid, number: u32, text: Option<&str>) -> Chapter {
        let mut ch = Chapter::new(book_id, number, format!("Chapter {}", number));
        if let Some(text) = text {
            ch.edit_text(text.to_string());
        }
        ch
    }

    #[test]
    fn test_estimate_sums_per_chapter() {
        let book_id = Uuid::new_v4();
        let chapters = vec![
            chapter(book_id, 2, Some("twenty characters!!!")),
            chapter(book_id, 1, Some("ten chars.")),
            chapter(book_id, 3, None),
        ];

        let estimate = estimate(&chapters, "tts-1", 0.5);
        assert_eq!(estimate.total_characters, 30);
        assert!((estimate.estimated_cost - 15.0).abs() < 1e-9);
        let numbers: Vec<u32> = estimate.chapters.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let book_id = Uuid::new_v4();
        let chapters = vec![
            chapter(book_id, 1, Some("Once upon a time.")),
            chapter(book_id, 2, Some("The end.")),
        ];
        assert_eq!(
            estimate(&chapters, "tts-1", 0.000015),
            estimate(&chapters, "tts-1", 0.000015)
        );
    }

    #[test]
    fn test_characters_counted_not_bytes() {
        assert_eq!(billable_characters("有声书"), 3);
    }
}
