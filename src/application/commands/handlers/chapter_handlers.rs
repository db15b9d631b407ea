//! Chapter Command Handlers
//!
//! 直接写入，不重开章节流水线

use std::sync::Arc;

use crate::application::commands::handlers::normalize_image_extension;
use crate::application::commands::{EditChapter, UploadChapterImage};
use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactStorePort, BookRepositoryPort, ChapterRepositoryPort};
use crate::domain::book::Book;
use crate::domain::generation::Chapter;

/// 章节插图存储路径
pub fn chapter_image_key(book_id: uuid::Uuid, chapter_number: u32, extension: &str) -> String {
    format!("books/{}/chapters/{}.{}", book_id, chapter_number, extension)
}

/// 读取章节；在 1..=total_chapters 范围内但尚未生成的章节按大纲标题新建
async fn load_or_new_chapter(
    chapter_repo: &Arc<dyn ChapterRepositoryPort>,
    book: &Book,
    number: u32,
) -> Result<Chapter, ApplicationError> {
    if let Some(chapter) = chapter_repo.find(book.id, number).await? {
        return Ok(chapter);
    }
    let total = book.total_chapters.unwrap_or(0);
    if number == 0 || number > total {
        return Err(ApplicationError::not_found(
            "Chapter",
            format!("{}#{}", book.id, number),
        ));
    }
    let title = book
        .outline
        .as_ref()
        .and_then(|o| o.entry(number))
        .map(|e| e.title.clone())
        .unwrap_or_else(|| format!("Chapter {}", number));
    Ok(Chapter::new(book.id, number, title))
}

/// EditChapter Handler
pub struct EditChapterHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
}

impl EditChapterHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>, chapter_repo: Arc<dyn ChapterRepositoryPort>) -> Self {
        Self {
            book_repo,
            chapter_repo,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: EditChapter) -> Result<Chapter, ApplicationError> {
        if cmd.text.is_none() && cmd.text_prompt.is_none() && cmd.image_prompt.is_none() {
            return Err(ApplicationError::validation("nothing to update"));
        }
        let book = self
            .book_repo
            .find_by_id(cmd.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", cmd.book_id))?;
        ctx.ensure_can_access(&book)?;

        let mut chapter = load_or_new_chapter(&self.chapter_repo, &book, cmd.chapter_number).await?;
        if let Some(text) = cmd.text {
            chapter.edit_text(text);
        }
        if let Some(prompt) = cmd.text_prompt {
            chapter.edit_text_prompt(prompt);
        }
        if let Some(prompt) = cmd.image_prompt {
            chapter.edit_image_prompt(prompt);
        }
        self.chapter_repo.upsert(&chapter).await?;

        tracing::info!(
            book_id = %book.id,
            chapter = chapter.number,
            word_count = chapter.metadata.word_count,
            "Chapter edited"
        );
        Ok(chapter)
    }
}

/// UploadChapterImage Handler
pub struct UploadChapterImageHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
}

impl UploadChapterImageHandler {
    pub fn new(
        book_repo: Arc<dyn BookRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
    ) -> Self {
        Self {
            book_repo,
            chapter_repo,
            artifact_store,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: UploadChapterImage) -> Result<Chapter, ApplicationError> {
        if cmd.data.is_empty() {
            return Err(ApplicationError::validation("image is empty"));
        }
        let extension = normalize_image_extension(&cmd.extension)?;
        let book = self
            .book_repo
            .find_by_id(cmd.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", cmd.book_id))?;
        ctx.ensure_can_access(&book)?;

        let mut chapter = load_or_new_chapter(&self.chapter_repo, &book, cmd.chapter_number).await?;
        let key = chapter_image_key(book.id, chapter.number, &extension);
        let url = self.artifact_store.put(&key, &cmd.data).await?;
        chapter.set_image_url(url);
        self.chapter_repo.upsert(&chapter).await?;

        tracing::info!(book_id = %book.id, chapter = chapter.number, "Chapter image uploaded");
        Ok(chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookContext, BookTitle, BookType, Niche, Outline, OutlineEntry};
    use crate::infrastructure::adapters::FileArtifactStore;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookRepository, SqliteChapterRepository,
    };

    struct Fixture {
        book: Book,
        books: Arc<SqliteBookRepository>,
        chapters: Arc<SqliteChapterRepository>,
    }

    async fn fixture() -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let books = Arc::new(SqliteBookRepository::new(pool.clone()));
        let chapters = Arc::new(SqliteChapterRepository::new(pool));

        let mut book = Book::new(
            "u1",
            BookTitle::new("Orchard Ledger").unwrap(),
            BookType::NonFiction,
            Niche::Business,
            BookContext::default(),
            true,
        )
        .unwrap();
        book.start_generation(2).unwrap();
        book.outline = Some(Outline {
            entries: vec![
                OutlineEntry {
                    number: 1,
                    title: "Seeds".to_string(),
                    summary: String::new(),
                },
                OutlineEntry {
                    number: 2,
                    title: "Harvest".to_string(),
                    summary: String::new(),
                },
            ],
        });
        book.finish_generation().unwrap();
        books.save(&book).await.unwrap();

        Fixture {
            book,
            books,
            chapters,
        }
    }

    fn edit(book_id: uuid::Uuid, number: u32, text: &str) -> EditChapter {
        EditChapter {
            book_id,
            chapter_number: number,
            text: Some(text.to_string()),
            text_prompt: None,
            image_prompt: None,
        }
    }

    #[tokio::test]
    async fn test_edit_recomputes_metadata() {
        let fx = fixture().await;
        let handler = EditChapterHandler::new(fx.books.clone(), fx.chapters.clone());
        let ctx = RequestContext::member("u1");

        let chapter = handler
            .handle(&ctx, edit(fx.book.id, 2, "Apples ripen slowly in the cold orchard"))
            .await
            .unwrap();
        assert_eq!(chapter.title, "Harvest");
        assert_eq!(chapter.metadata.word_count, 7);

        let chapter = handler
            .handle(&ctx, edit(fx.book.id, 2, "Pears"))
            .await
            .unwrap();
        assert_eq!(chapter.metadata.word_count, 1);
        let stored = fx.chapters.find(fx.book.id, 2).await.unwrap().unwrap();
        assert_eq!(stored.text.as_deref(), Some("Pears"));
    }

    #[tokio::test]
    async fn test_edit_out_of_range_or_empty() {
        let fx = fixture().await;
        let handler = EditChapterHandler::new(fx.books.clone(), fx.chapters.clone());
        let ctx = RequestContext::member("u1");

        let err = handler.handle(&ctx, edit(fx.book.id, 3, "late")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));

        let err = handler
            .handle(
                &ctx,
                EditChapter {
                    text: None,
                    ..edit(fx.book.id, 1, "")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_chapter_image() {
        let fx = fixture().await;
        let artifacts = tempfile::tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(artifacts.path(), "/media").await.unwrap());
        let handler = UploadChapterImageHandler::new(fx.books.clone(), fx.chapters.clone(), store);

        let chapter = handler
            .handle(
                &RequestContext::member("u1"),
                UploadChapterImage {
                    book_id: fx.book.id,
                    chapter_number: 1,
                    data: vec![1, 2, 3],
                    extension: "webp".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(chapter.has_image());
        assert!(artifacts
            .path()
            .join(chapter_image_key(fx.book.id, 1, "webp"))
            .exists());
    }
}
