//! 文本工具
//!
//! 字数统计、关键词提取、大纲解析、试听片段截取

use std::collections::HashMap;

use super::book::OutlineEntry;

/// 关键词最小长度（字母数）
pub const MIN_KEYWORD_LETTERS: usize = 4;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "been", "before", "being", "below",
    "between", "both", "could", "does", "doing", "down", "during", "each", "even", "ever", "every",
    "from", "further", "have", "having", "here", "hers", "herself", "himself", "into", "itself",
    "just", "like", "more", "most", "much", "must", "myself", "never", "only", "other", "ours",
    "ourselves", "over", "said", "same", "should", "since", "some", "such", "than", "that",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "under", "until", "upon", "very", "was", "were", "what", "when", "where", "which",
    "while", "whom", "will", "with", "would", "your", "yours", "yourself", "yourselves",
];

/// 句末标点
#[inline]
fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！' | '.' | '?' | '!')
}

/// 按空白分词计数
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// 出现次数最多的非停用词，同频按字母序
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for raw in text.split(|c: char| !c.is_alphabetic() && c != '\'') {
        let word = raw.trim_matches('\'').to_lowercase();
        if word.chars().filter(|c| c.is_alphabetic()).count() < MIN_KEYWORD_LETTERS {
            continue;
        }
        if STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

/// 解析大纲
///
/// 每行一章，支持以下格式:
/// - `1. Title: summary`
/// - `Chapter 2 - Title - summary`
/// - `Title - summary`
/// - JSON 数组 `[{"title": "...", "summary": "..."}]`
///
/// 编号按出现顺序重新分配
pub fn parse_outline(raw: &str) -> Vec<OutlineEntry> {
    if let Some(entries) = parse_outline_json(raw) {
        return entries;
    }

    raw.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_outline_line)
        .enumerate()
        .map(|(i, (title, summary))| OutlineEntry {
            number: i as u32 + 1,
            title,
            summary,
        })
        .collect()
}

fn parse_outline_json(raw: &str) -> Option<Vec<OutlineEntry>> {
    #[derive(serde::Deserialize)]
    struct JsonEntry {
        title: String,
        #[serde(default)]
        summary: String,
    }

    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    let items: Vec<JsonEntry> = serde_json::from_str(trimmed).ok()?;
    Some(
        items
            .into_iter()
            .filter(|item| !item.title.trim().is_empty())
            .enumerate()
            .map(|(i, item)| OutlineEntry {
                number: i as u32 + 1,
                title: item.title.trim().to_string(),
                summary: item.summary.trim().to_string(),
            })
            .collect(),
    )
}

fn parse_outline_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_start_matches(['-', '*', '•']).trim();
    let line = strip_chapter_label(line);
    let line = strip_numbering(line);

    let (title, summary) = match line.split_once(':') {
        Some((t, s)) => (t, s),
        None => match line.split_once(" - ") {
            Some((t, s)) => (t, s),
            None => (line, ""),
        },
    };
    let title = title.trim().trim_matches('*').trim();
    if title.is_empty() {
        return None;
    }
    Some((title.to_string(), summary.trim().to_string()))
}

fn strip_chapter_label(line: &str) -> &str {
    match line.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chapter ") => line[8..].trim_start(),
        _ => line,
    }
}

fn strip_numbering(line: &str) -> &str {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return line;
    }
    let rest = &line[digits..];
    let rest = rest
        .strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .or_else(|| rest.strip_prefix(" -"))
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    rest.trim_start()
}

/// 截取不超过 max_chars 个字符的片段，尽量回退到句末
///
/// 若范围内没有句末标点则按字符截断
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars).collect();
    match head.char_indices().filter(|(_, c)| is_sentence_end(*c)).last() {
        Some((idx, ch)) => head[..idx + ch.len_utf8()].to_string(),
        None => head.trim_end().to_string(),
    }
}

/// 生成摘要（用于后续章节的上下文）
pub fn summarize(text: &str, max_chars: usize) -> String {
    let first_paragraph = text
        .lines()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .unwrap_or("");
    excerpt(first_paragraph, max_chars)
}
