//! Publish Command Handler
//!
//! 就绪评估 -> （可强制）打包 -> 存储 -> Book 置为 published

use serde::Serialize;
use std::sync::Arc;

use crate::application::commands::PublishBook;
use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactPackagerPort, ArtifactStorePort, BookRepositoryPort, ChapterRepositoryPort, Manuscript,
};
use crate::domain::book::{PublishFormat, PublishedArtifact};
use crate::domain::evaluate;
use crate::infrastructure::events::EventPublisher;

/// 发布结果，issues 即使强制发布也会返回
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub book_id: uuid::Uuid,
    pub ready: bool,
    pub forced: bool,
    pub issues: Vec<String>,
    pub artifacts: Vec<PublishedArtifact>,
}

/// PublishBook Handler
pub struct PublishBookHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    packager: Arc<dyn ArtifactPackagerPort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
    event_publisher: Arc<EventPublisher>,
}

impl PublishBookHandler {
    pub fn new(
        book_repo: Arc<dyn BookRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        packager: Arc<dyn ArtifactPackagerPort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            book_repo,
            chapter_repo,
            packager,
            artifact_store,
            event_publisher,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: PublishBook) -> Result<PublishResult, ApplicationError> {
        let mut formats: Vec<PublishFormat> = Vec::with_capacity(cmd.formats.len());
        for format in cmd.formats.iter().copied() {
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        if formats.is_empty() {
            return Err(ApplicationError::validation("at least one format is required"));
        }

        let mut book = self
            .book_repo
            .find_by_id(cmd.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", cmd.book_id))?;
        ctx.ensure_can_access(&book)?;

        if !book.can_publish() {
            return Err(ApplicationError::invalid_transition(format!(
                "book {} cannot be published while {}",
                book.id,
                book.status.as_str()
            )));
        }

        let chapters = self.chapter_repo.find_by_book(book.id).await?;
        let status = evaluate(&book, &chapters);
        if !status.ready && !cmd.force {
            tracing::info!(book_id = %book.id, issues = status.issues.len(), "Publish rejected, book not ready");
            return Err(ApplicationError::NotReady {
                issues: status.issues,
            });
        }
        if !status.ready {
            tracing::warn!(
                book_id = %book.id,
                issues = ?status.issues,
                "Force publishing with outstanding issues"
            );
        }

        let manuscript = Manuscript::assemble(&book, &chapters);
        let mut artifacts = Vec::with_capacity(formats.len());
        for format in formats.iter().copied() {
            let data = self.packager.package(&manuscript, format).await?;
            let key = artifact_key(book.id, format);
            let url = self.artifact_store.put(&key, &data).await?;
            tracing::info!(book_id = %book.id, format = format.as_str(), bytes = data.len(), "Artifact stored");
            artifacts.push(PublishedArtifact { format, url });
        }

        // 产物合并在快照上完成，写入以书籍仍可发布为条件
        book.mark_published(artifacts.clone())?;
        self.book_repo.record_published(book.id, &book.artifacts).await?;

        self.event_publisher.publish_book_published(
            book.id,
            formats.iter().map(|f| f.as_str().to_string()).collect(),
            cmd.force,
        );

        Ok(PublishResult {
            book_id: book.id,
            ready: status.ready,
            forced: cmd.force && !status.ready,
            issues: status.issues,
            artifacts,
        })
    }
}

/// 电子书存储路径
pub fn artifact_key(book_id: uuid::Uuid, format: PublishFormat) -> String {
    format!("books/{}/book.{}", book_id, format.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{Book, BookContext, BookStatus, BookTitle, BookType, Niche, Outline, OutlineEntry};
    use crate::domain::generation::Chapter;
    use crate::infrastructure::adapters::{FakePackager, FileArtifactStore};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookRepository, SqliteChapterRepository,
    };
    use tempfile::TempDir;

    struct Fixture {
        handler: PublishBookHandler,
        books: Arc<SqliteBookRepository>,
        chapters: Arc<SqliteChapterRepository>,
        artifacts: TempDir,
    }

    async fn fixture() -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let artifacts = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(artifacts.path(), "/media").await.unwrap();

        let books = Arc::new(SqliteBookRepository::new(pool.clone()));
        let chapters = Arc::new(SqliteChapterRepository::new(pool));
        let handler = PublishBookHandler::new(
            books.clone(),
            chapters.clone(),
            Arc::new(FakePackager::new()),
            Arc::new(store),
            EventPublisher::new().arc(),
        );
        Fixture {
            handler,
            books,
            chapters,
            artifacts,
        }
    }

    impl Fixture {
        /// 生成结束的两章书籍，第二章可选缺少插图
        async fn generated_book(&self, second_image: bool) -> Book {
            let mut book = Book::new(
                "u1",
                BookTitle::new("Salt Roads").unwrap(),
                BookType::Novel,
                Niche::Fantasy,
                BookContext::default(),
                false,
            )
            .unwrap();
            book.start_generation(2).unwrap();
            book.outline = Some(Outline {
                entries: (1..=2)
                    .map(|n| OutlineEntry {
                        number: n,
                        title: format!("Leg {}", n),
                        summary: String::new(),
                    })
                    .collect(),
            });
            book.finish_generation().unwrap();
            self.books.save(&book).await.unwrap();

            for number in 1..=2 {
                let mut chapter = Chapter::new(book.id, number, format!("Leg {}", number));
                chapter.edit_text(format!("The caravan reached waypoint {}.", number));
                if number == 1 || second_image {
                    chapter.set_image_url(format!("/media/books/{}/chapter-{}.png", book.id, number));
                }
                self.chapters.upsert(&chapter).await.unwrap();
            }
            book
        }
    }

    fn publish(book_id: uuid::Uuid, force: bool) -> PublishBook {
        PublishBook {
            book_id,
            formats: vec![PublishFormat::Epub, PublishFormat::Epub, PublishFormat::Docx],
            force,
        }
    }

    #[tokio::test]
    async fn test_ready_book_is_packaged_and_published() {
        let fx = fixture().await;
        let book = fx.generated_book(true).await;

        let result = fx
            .handler
            .handle(&RequestContext::member("u1"), publish(book.id, false))
            .await
            .unwrap();

        assert!(result.ready);
        assert!(!result.forced);
        assert_eq!(result.artifacts.len(), 2);
        let epub = fx.artifacts.path().join(artifact_key(book.id, PublishFormat::Epub));
        assert!(epub.exists());

        let stored = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookStatus::Published);
        assert_eq!(stored.artifacts.len(), 2);
    }

    #[tokio::test]
    async fn test_not_ready_without_force_lists_issues() {
        let fx = fixture().await;
        let book = fx.generated_book(false).await;

        let err = fx
            .handler
            .handle(&RequestContext::member("u1"), publish(book.id, false))
            .await
            .unwrap_err();

        match err {
            ApplicationError::NotReady { issues } => {
                assert_eq!(issues, vec!["Chapter 2 has no image".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let stored = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookStatus::Complete);
    }

    #[tokio::test]
    async fn test_forced_publish_still_reports_issues() {
        let fx = fixture().await;
        let book = fx.generated_book(false).await;

        let result = fx
            .handler
            .handle(&RequestContext::member("u1"), publish(book.id, true))
            .await
            .unwrap();

        assert!(!result.ready);
        assert!(result.forced);
        assert_eq!(result.issues.len(), 1);
        let stored = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookStatus::Published);
    }

    #[tokio::test]
    async fn test_generating_book_cannot_be_published() {
        let fx = fixture().await;
        let mut book = fx.generated_book(true).await;
        book.start_generation(2).unwrap();
        fx.books.save(&book).await.unwrap();

        let err = fx
            .handler
            .handle(&RequestContext::member("u1"), publish(book.id, true))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_empty_formats_rejected() {
        let fx = fixture().await;
        let book = fx.generated_book(true).await;

        let err = fx
            .handler
            .handle(
                &RequestContext::member("u1"),
                PublishBook {
                    book_id: book.id,
                    formats: Vec::new(),
                    force: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }
}
