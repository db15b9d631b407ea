//! 生成提示词
//!
//! 章节类提示词首行固定为 `Chapter {n}: {title}`

use crate::domain::book::{Book, BookContext, OutlineEntry};

/// 前文摘要的最大字符数
pub const SUMMARY_CHARS: usize = 400;

fn context_lines(context: &BookContext) -> String {
    let mut lines = Vec::new();
    if !context.description.trim().is_empty() {
        lines.push(format!("Description: {}", context.description.trim()));
    }
    if !context.audience.trim().is_empty() {
        lines.push(format!("Audience: {}", context.audience.trim()));
    }
    if !context.tone.trim().is_empty() {
        lines.push(format!("Tone: {}", context.tone.trim()));
    }
    if context.use_news_search {
        lines.push("Ground the content in recent, verifiable news where relevant.".to_string());
    }
    lines.join("\n")
}

pub fn outline(book: &Book, total_chapters: u32) -> String {
    format!(
        "Write a chapter outline for the {} {} book \"{}\".\n\
         Number of chapters: {}\n\
         {}\n\
         Answer with one line per chapter in the form `N. Title: one sentence summary`.",
        book.niche.as_str(),
        book.book_type.as_str(),
        book.title,
        total_chapters,
        context_lines(&book.context),
    )
}

pub fn chapter_text(book: &Book, entry: &OutlineEntry, total_chapters: u32, previous_summary: Option<&str>) -> String {
    let size = book.context.chapter_size.unwrap_or_default();
    let mut prompt = format!(
        "Chapter {}: {}\n\
         Write chapter {} of {} for the book \"{}\".\n\
         Chapter summary: {}\n\
         Target length: about {} words.\n\
         {}",
        entry.number,
        entry.title,
        entry.number,
        total_chapters,
        book.title,
        entry.summary,
        size.target_words(),
        context_lines(&book.context),
    );
    if let Some(summary) = previous_summary.filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("\nThe previous chapter ended: {}", summary));
    }
    prompt
}

pub fn image_prompt(book: &Book, number: u32, title: &str, text: &str) -> String {
    format!(
        "Chapter {}: {}\n\
         Describe one illustration for this chapter of \"{}\" in a single paragraph \
         suitable for an image model. Chapter opening:\n{}",
        number,
        title,
        book.title,
        crate::domain::text::excerpt(text, SUMMARY_CHARS),
    )
}

pub fn cover_prompt(book: &Book) -> String {
    format!(
        "Describe a cover illustration for the {} {} book \"{}\" in a single paragraph \
         suitable for an image model. Do not include any text on the cover.\n{}",
        book.niche.as_str(),
        book.book_type.as_str(),
        book.title,
        context_lines(&book.context),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookTitle, BookType, Niche};

    fn book() -> Book {
        Book::new(
            "u1",
            BookTitle::new("Salt Roads").unwrap(),
            BookType::Novel,
            Niche::History,
            BookContext {
                description: "Merchants crossing the desert".into(),
                ..Default::default()
            },
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_outline_declares_chapter_count() {
        let prompt = outline(&book(), 7);
        assert!(prompt.lines().any(|l| l == "Number of chapters: 7"));
        assert!(prompt.contains("Description: Merchants crossing the desert"));
    }

    #[test]
    fn test_chapter_prompt_starts_with_heading() {
        let entry = OutlineEntry {
            number: 3,
            title: "Oasis".into(),
            summary: "Water at last".into(),
        };
        let prompt = chapter_text(&book(), &entry, 5, Some("They slept."));
        assert!(prompt.starts_with("Chapter 3: Oasis\n"));
        assert!(prompt.ends_with("The previous chapter ended: They slept."));
    }
}
