//! Book Context - 书籍限界上下文
//!
//! 职责:
//! - Book 聚合（状态、上下文、大纲、封面、发布产物）
//! - 目录枚举（类型、细分领域）

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::{Book, BookStatus, PublishFormat, PublishedArtifact};
pub use errors::BookError;
pub use value_objects::{
    BookContext, BookTitle, BookType, ChapterSize, Niche, Outline, OutlineEntry, MAX_CHAPTERS,
};
