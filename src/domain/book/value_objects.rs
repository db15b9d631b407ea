//! Book Context - Value Objects

use serde::{Deserialize, Serialize};

use super::BookError;

/// 书名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTitle(String);

impl BookTitle {
    pub fn new(title: impl Into<String>) -> Result<Self, BookError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(BookError::InvalidTitle("title cannot be empty".to_string()));
        }
        if title.chars().count() > 200 {
            return Err(BookError::InvalidTitle(
                "title cannot exceed 200 characters".to_string(),
            ));
        }
        Ok(Self(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for BookTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 书籍类型（目录枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookType {
    Novel,
    NonFiction,
    Children,
    Guide,
    Poetry,
}

impl BookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookType::Novel => "novel",
            BookType::NonFiction => "non_fiction",
            BookType::Children => "children",
            BookType::Guide => "guide",
            BookType::Poetry => "poetry",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "novel" => Some(BookType::Novel),
            "non_fiction" => Some(BookType::NonFiction),
            "children" => Some(BookType::Children),
            "guide" => Some(BookType::Guide),
            "poetry" => Some(BookType::Poetry),
            _ => None,
        }
    }

    /// 该类型默认是否需要章节插图
    pub fn illustrated_by_default(&self) -> bool {
        matches!(self, BookType::Children | BookType::Guide)
    }
}

/// 细分领域（目录枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Niche {
    Fantasy,
    Mystery,
    Romance,
    ScienceFiction,
    Business,
    Health,
    History,
    Education,
    Cooking,
    Travel,
}

impl Niche {
    pub fn as_str(&self) -> &'static str {
        match self {
            Niche::Fantasy => "fantasy",
            Niche::Mystery => "mystery",
            Niche::Romance => "romance",
            Niche::ScienceFiction => "science_fiction",
            Niche::Business => "business",
            Niche::Health => "health",
            Niche::History => "history",
            Niche::Education => "education",
            Niche::Cooking => "cooking",
            Niche::Travel => "travel",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fantasy" => Some(Niche::Fantasy),
            "mystery" => Some(Niche::Mystery),
            "romance" => Some(Niche::Romance),
            "science_fiction" => Some(Niche::ScienceFiction),
            "business" => Some(Niche::Business),
            "health" => Some(Niche::Health),
            "history" => Some(Niche::History),
            "education" => Some(Niche::Education),
            "cooking" => Some(Niche::Cooking),
            "travel" => Some(Niche::Travel),
            _ => None,
        }
    }
}

/// 章节篇幅提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterSize {
    Short,
    Medium,
    Long,
}

impl ChapterSize {
    /// 目标字数
    pub fn target_words(&self) -> u32 {
        match self {
            ChapterSize::Short => 800,
            ChapterSize::Medium => 1800,
            ChapterSize::Long => 3500,
        }
    }
}

impl Default for ChapterSize {
    fn default() -> Self {
        ChapterSize::Medium
    }
}

/// 章节数上限
pub const MAX_CHAPTERS: u32 = 50;

/// 生成上下文
///
/// 用户填写的自由格式描述，生成时拼入提示词
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookContext {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub chapter_count: Option<u32>,
    #[serde(default)]
    pub chapter_size: Option<ChapterSize>,
    /// 使用外部新闻检索补充素材
    #[serde(default)]
    pub use_news_search: bool,
    /// 跳过章节插图提示词生成
    #[serde(default)]
    pub skip_image_prompts: bool,
}

impl BookContext {
    pub fn validate(&self) -> Result<(), BookError> {
        if let Some(count) = self.chapter_count {
            if count == 0 || count > MAX_CHAPTERS {
                return Err(BookError::InvalidContext(format!(
                    "chapter_count must be between 1 and {}",
                    MAX_CHAPTERS
                )));
            }
        }
        if self.description.chars().count() > 5000 {
            return Err(BookError::InvalidContext(
                "description cannot exceed 5000 characters".to_string(),
            ));
        }
        Ok(())
    }

    /// 目标章节数，未指定时使用默认值
    pub fn resolved_chapter_count(&self, default_count: u32) -> u32 {
        self.chapter_count.unwrap_or(default_count).clamp(1, MAX_CHAPTERS)
    }
}

/// 大纲条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub number: u32,
    pub title: String,
    pub summary: String,
}

/// 书籍大纲
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub entries: Vec<OutlineEntry>,
}

impl Outline {
    pub fn entry(&self, number: u32) -> Option<&OutlineEntry> {
        self.entries.iter().find(|e| e.number == number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
