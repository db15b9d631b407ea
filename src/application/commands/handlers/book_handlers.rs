//! Book Command Handlers

use std::sync::Arc;

use crate::application::commands::{CreateBook, UpdateBookSettings, UploadCoverImage};
use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactStorePort, BookRepositoryPort, BookSettingsUpdate};
use crate::domain::book::{Book, BookStatus, BookTitle, BookType, Niche};

/// 允许上传的图片扩展名
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// 规范化并校验图片扩展名
pub fn normalize_image_extension(extension: &str) -> Result<String, ApplicationError> {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ApplicationError::validation(format!(
            "unsupported image type: {}",
            extension
        )))
    }
}

/// 封面存储路径
pub fn cover_image_key(book_id: uuid::Uuid, extension: &str) -> String {
    format!("books/{}/cover.{}", book_id, extension)
}

/// 生成的封面与上传的封面分开存放
pub fn generated_cover_key(book_id: uuid::Uuid, extension: &str) -> String {
    format!("books/{}/cover-generated.{}", book_id, extension)
}

async fn reload(book_repo: &Arc<dyn BookRepositoryPort>, book_id: uuid::Uuid) -> Result<Book, ApplicationError> {
    book_repo
        .find_by_id(book_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("Book", book_id))
}

/// CreateBook Handler
pub struct CreateBookHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
}

impl CreateBookHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>) -> Self {
        Self { book_repo }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: CreateBook) -> Result<Book, ApplicationError> {
        let title = BookTitle::new(cmd.title)?;
        let book_type = BookType::from_str(&cmd.book_type)
            .ok_or_else(|| ApplicationError::validation(format!("unknown book type: {}", cmd.book_type)))?;
        let niche = Niche::from_str(&cmd.niche)
            .ok_or_else(|| ApplicationError::validation(format!("unknown niche: {}", cmd.niche)))?;
        let without_images = cmd
            .publish_without_chapter_images
            .unwrap_or(!book_type.illustrated_by_default());

        let book = Book::new(&ctx.user_id, title, book_type, niche, cmd.context, without_images)?;
        self.book_repo.save(&book).await?;

        tracing::info!(
            book_id = %book.id,
            owner = %ctx.user_id,
            book_type = book_type.as_str(),
            "Book created"
        );

        Ok(book)
    }
}

/// UpdateBookSettings Handler
///
/// 生成中不允许修改 context，其余设置随时可改
pub struct UpdateBookSettingsHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
}

impl UpdateBookSettingsHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>) -> Self {
        Self { book_repo }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: UpdateBookSettings) -> Result<Book, ApplicationError> {
        let book = reload(&self.book_repo, cmd.book_id).await?;
        ctx.ensure_can_access(&book)?;

        if let Some(context) = &cmd.context {
            if book.status == BookStatus::Generating {
                return Err(ApplicationError::invalid_transition(
                    "context cannot change while the book is generating",
                ));
            }
            context.validate()?;
        }
        let update = BookSettingsUpdate {
            context: cmd.context,
            publish_without_chapter_images: cmd.publish_without_chapter_images,
            cover_image_prompt: cmd.cover_image_prompt.map(|prompt| {
                let prompt = prompt.trim().to_string();
                (!prompt.is_empty()).then_some(prompt)
            }),
        };
        // 生成在读取之后开始时，由存储层的条件更新拒绝 context 修改
        self.book_repo.update_settings(book.id, &update).await?;

        tracing::info!(book_id = %book.id, "Book settings updated");
        reload(&self.book_repo, book.id).await
    }
}

/// UploadCoverImage Handler
pub struct UploadCoverImageHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
}

impl UploadCoverImageHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>, artifact_store: Arc<dyn ArtifactStorePort>) -> Self {
        Self {
            book_repo,
            artifact_store,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: UploadCoverImage) -> Result<Book, ApplicationError> {
        if cmd.data.is_empty() {
            return Err(ApplicationError::validation("image is empty"));
        }
        let extension = normalize_image_extension(&cmd.extension)?;
        let book = reload(&self.book_repo, cmd.book_id).await?;
        ctx.ensure_can_access(&book)?;

        let key = cover_image_key(book.id, &extension);
        let url = self.artifact_store.put(&key, &cmd.data).await?;
        self.book_repo.set_cover_image_url(book.id, &url).await?;

        tracing::info!(book_id = %book.id, bytes = cmd.data.len(), "Cover image uploaded");
        reload(&self.book_repo, book.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::BookContext;
    use crate::infrastructure::adapters::FileArtifactStore;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookRepository,
    };

    async fn repo() -> Arc<SqliteBookRepository> {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteBookRepository::new(pool))
    }

    fn create(title: &str, book_type: &str) -> CreateBook {
        CreateBook {
            title: title.to_string(),
            book_type: book_type.to_string(),
            niche: "mystery".to_string(),
            context: BookContext::default(),
            publish_without_chapter_images: None,
        }
    }

    #[test]
    fn test_normalize_image_extension() {
        assert_eq!(normalize_image_extension(".PNG").unwrap(), "png");
        assert_eq!(normalize_image_extension("jpeg").unwrap(), "jpeg");
        assert!(normalize_image_extension("gif").is_err());
    }

    #[tokio::test]
    async fn test_create_book_applies_type_defaults() {
        let books = repo().await;
        let handler = CreateBookHandler::new(books.clone());
        let ctx = RequestContext::member("u1");

        let novel = handler.handle(&ctx, create("Dust Almanac", "novel")).await.unwrap();
        assert_eq!(novel.owner_id, "u1");
        assert_eq!(novel.status, BookStatus::Draft);
        assert!(novel.publish_without_chapter_images);

        let guide = handler.handle(&ctx, create("Garden Guide", "guide")).await.unwrap();
        assert!(!guide.publish_without_chapter_images);
        assert!(books.find_by_id(guide.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_book_validation() {
        let handler = CreateBookHandler::new(repo().await);
        let ctx = RequestContext::member("u1");

        for cmd in [
            create("   ", "novel"),
            create("Dust Almanac", "screenplay"),
            CreateBook {
                niche: "astrology".to_string(),
                ..create("Dust Almanac", "novel")
            },
            CreateBook {
                context: BookContext {
                    chapter_count: Some(0),
                    ..Default::default()
                },
                ..create("Dust Almanac", "novel")
            },
        ] {
            let err = handler.handle(&ctx, cmd).await.unwrap_err();
            assert!(matches!(err, ApplicationError::Validation(_)), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn test_settings_context_locked_while_generating() {
        let books = repo().await;
        let ctx = RequestContext::member("u1");
        let mut book = CreateBookHandler::new(books.clone())
            .handle(&ctx, create("Dust Almanac", "novel"))
            .await
            .unwrap();
        book.start_generation(3).unwrap();
        books.save(&book).await.unwrap();
        let handler = UpdateBookSettingsHandler::new(books.clone());

        let err = handler
            .handle(
                &ctx,
                UpdateBookSettings {
                    book_id: book.id,
                    context: Some(BookContext::default()),
                    publish_without_chapter_images: None,
                    cover_image_prompt: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidTransition(_)));

        let updated = handler
            .handle(
                &ctx,
                UpdateBookSettings {
                    book_id: book.id,
                    context: None,
                    publish_without_chapter_images: Some(false),
                    cover_image_prompt: Some("  a lantern on a pier  ".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(!updated.publish_without_chapter_images);
        assert_eq!(updated.cover_image_prompt.as_deref(), Some("a lantern on a pier"));
    }

    #[tokio::test]
    async fn test_other_member_cannot_update() {
        let books = repo().await;
        let book = CreateBookHandler::new(books.clone())
            .handle(&RequestContext::member("u1"), create("Dust Almanac", "novel"))
            .await
            .unwrap();

        let err = UpdateBookSettingsHandler::new(books)
            .handle(
                &RequestContext::member("u2"),
                UpdateBookSettings {
                    book_id: book.id,
                    context: None,
                    publish_without_chapter_images: Some(true),
                    cover_image_prompt: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_upload_cover_stores_image() {
        let books = repo().await;
        let artifacts = tempfile::tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(artifacts.path(), "/media").await.unwrap());
        let ctx = RequestContext::member("u1");
        let book = CreateBookHandler::new(books.clone())
            .handle(&ctx, create("Dust Almanac", "novel"))
            .await
            .unwrap();
        let handler = UploadCoverImageHandler::new(books.clone(), store);

        let updated = handler
            .handle(
                &ctx,
                UploadCoverImage {
                    book_id: book.id,
                    data: vec![0x89, b'P', b'N', b'G'],
                    extension: "PNG".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(updated.cover_image_url.is_some());
        assert!(artifacts.path().join(cover_image_key(book.id, "png")).exists());

        let err = handler
            .handle(
                &ctx,
                UploadCoverImage {
                    book_id: book.id,
                    data: Vec::new(),
                    extension: "png".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }
}
