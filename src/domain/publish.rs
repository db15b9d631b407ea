//! 发布就绪评估
//!
//! 纯函数，不持久化，每次按需计算

use serde::Serialize;
use std::collections::HashMap;

use super::book::Book;
use super::generation::Chapter;

/// 发布就绪状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishStatus {
    pub ready: bool,
    pub issues: Vec<String>,
}

/// 评估书籍是否可以发布
///
/// 规则（每条违反产生一条 issue）:
/// - 大纲已生成
/// - 1..=total_chapters 每章存在且正文非空
/// - 每章都有插图，除非 `publish_without_chapter_images`
pub fn evaluate(book: &Book, chapters: &[Chapter]) -> PublishStatus {
    let mut issues = Vec::new();

    if book.outline.as_ref().map_or(true, |o| o.is_empty()) {
        issues.push("Outline has not been generated".to_string());
    }

    let by_number: HashMap<u32, &Chapter> = chapters.iter().map(|c| (c.number, c)).collect();
    for number in 1..=book.total_chapters.unwrap_or(0) {
        let Some(chapter) = by_number.get(&number) else {
            issues.push(format!("Chapter {} is missing", number));
            continue;
        };
        if !chapter.has_text() {
            issues.push(format!("Chapter {} has no text", number));
        }
        if !book.publish_without_chapter_images && !chapter.has_image() {
            issues.push(format!("Chapter {} has no image", number));
        }
    }

    PublishStatus {
        ready: issues.is_empty(),
        issues,
    }
}
