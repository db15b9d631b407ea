//! Audiobook Query Handlers

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::commands::handlers::AudiobookSettings;
use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactStorePort, AudiobookRepositoryPort, BookRepositoryPort, ChapterRepositoryPort,
};
use crate::application::queries::{EstimateAudiobook, GetAudiobookStatus, GetAuxiliaryAudio};
use crate::domain::audiobook::{estimate, AudiobookEstimate, AudiobookJob, AuxiliaryAsset};
use crate::domain::book::Book;

/// 有声书状态快照
#[derive(Debug, Clone, Serialize)]
pub struct AudiobookStatusView {
    pub book_id: uuid::Uuid,
    pub job: Option<AudiobookJob>,
    pub assets: Vec<AuxiliaryAsset>,
}

/// 附加音频下载信息
#[derive(Debug, Clone)]
pub struct AuxiliaryAudioFile {
    pub asset: AuxiliaryAsset,
    pub path: PathBuf,
}

async fn load_book(
    book_repo: &Arc<dyn BookRepositoryPort>,
    ctx: &RequestContext,
    book_id: uuid::Uuid,
) -> Result<Book, ApplicationError> {
    let book = book_repo
        .find_by_id(book_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("Book", book_id))?;
    ctx.ensure_can_access(&book)?;
    Ok(book)
}

/// EstimateAudiobook Handler（纯计算，不写入）
pub struct EstimateAudiobookHandler {
    settings: AudiobookSettings,
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
}

impl EstimateAudiobookHandler {
    pub fn new(
        settings: AudiobookSettings,
        book_repo: Arc<dyn BookRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
    ) -> Self {
        Self {
            settings,
            book_repo,
            chapter_repo,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, query: EstimateAudiobook) -> Result<AudiobookEstimate, ApplicationError> {
        let (model, rate) = self.settings.resolve_model(query.model.as_deref())?;
        let book = load_book(&self.book_repo, ctx, query.book_id).await?;
        let chapters = self.chapter_repo.find_by_book(book.id).await?;
        Ok(estimate(&chapters, &model, rate))
    }
}

/// GetAudiobookStatus Handler
pub struct GetAudiobookStatusHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
}

impl GetAudiobookStatusHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>, audiobook_repo: Arc<dyn AudiobookRepositoryPort>) -> Self {
        Self {
            book_repo,
            audiobook_repo,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, query: GetAudiobookStatus) -> Result<AudiobookStatusView, ApplicationError> {
        let book = load_book(&self.book_repo, ctx, query.book_id).await?;
        Ok(AudiobookStatusView {
            book_id: book.id,
            job: self.audiobook_repo.find_latest_for_book(book.id).await?,
            assets: self.audiobook_repo.find_assets(book.id).await?,
        })
    }
}

/// GetAuxiliaryAudio Handler
pub struct GetAuxiliaryAudioHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
}

impl GetAuxiliaryAudioHandler {
    pub fn new(
        book_repo: Arc<dyn BookRepositoryPort>,
        audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
    ) -> Self {
        Self {
            book_repo,
            audiobook_repo,
            artifact_store,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, query: GetAuxiliaryAudio) -> Result<AuxiliaryAudioFile, ApplicationError> {
        let book = load_book(&self.book_repo, ctx, query.book_id).await?;
        let asset = self
            .audiobook_repo
            .find_asset(book.id, query.kind)
            .await?
            .ok_or_else(|| ApplicationError::not_found("AuxiliaryAudio", query.kind.as_str()))?;
        let path = self.artifact_store.resolve(&query.kind.storage_key(book.id))?;
        Ok(AuxiliaryAudioFile { asset, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::domain::audiobook::{AudiobookJob, AuxiliaryKind, RateTable};
    use crate::domain::book::{BookContext, BookTitle, BookType, Niche};
    use crate::domain::generation::Chapter;
    use crate::infrastructure::adapters::FileArtifactStore;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteAudiobookRepository, SqliteBookRepository,
        SqliteChapterRepository,
    };

    fn settings() -> AudiobookSettings {
        AudiobookSettings {
            voices: vec!["alloy".to_string()],
            default_voice: "alloy".to_string(),
            default_model: "tts-1".to_string(),
            rates: RateTable::new(HashMap::from([("tts-1".to_string(), 0.5)])),
            sample_characters: 100,
        }
    }

    struct Fixture {
        book: Book,
        books: Arc<SqliteBookRepository>,
        chapters: Arc<SqliteChapterRepository>,
        audiobooks: Arc<SqliteAudiobookRepository>,
    }

    async fn fixture() -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let books = Arc::new(SqliteBookRepository::new(pool.clone()));
        let book = Book::new(
            "u1",
            BookTitle::new("Kite Season").unwrap(),
            BookType::Novel,
            Niche::Romance,
            BookContext::default(),
            true,
        )
        .unwrap();
        books.save(&book).await.unwrap();

        Fixture {
            book,
            books,
            chapters: Arc::new(SqliteChapterRepository::new(pool.clone())),
            audiobooks: Arc::new(SqliteAudiobookRepository::new(pool)),
        }
    }

    #[tokio::test]
    async fn test_estimate_skips_chapters_without_text() {
        let fx = fixture().await;
        let mut first = Chapter::new(fx.book.id, 1, "Wind");
        first.edit_text("abcd".to_string());
        fx.chapters.upsert(&first).await.unwrap();
        fx.chapters.upsert(&Chapter::new(fx.book.id, 2, "Calm")).await.unwrap();

        let estimate = EstimateAudiobookHandler::new(settings(), fx.books.clone(), fx.chapters.clone())
            .handle(
                &RequestContext::member("u1"),
                EstimateAudiobook {
                    book_id: fx.book.id,
                    model: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(estimate.model, "tts-1");
        assert_eq!(estimate.total_characters, 4);
        assert!((estimate.estimated_cost - 2.0).abs() < f64::EPSILON);
        assert_eq!(estimate.chapters.len(), 1);
    }

    #[tokio::test]
    async fn test_estimate_rejects_unknown_model() {
        let fx = fixture().await;
        let err = EstimateAudiobookHandler::new(settings(), fx.books.clone(), fx.chapters.clone())
            .handle(
                &RequestContext::member("u1"),
                EstimateAudiobook {
                    book_id: fx.book.id,
                    model: Some("tts-9".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_status_reports_latest_job() {
        let fx = fixture().await;
        let handler = GetAudiobookStatusHandler::new(fx.books.clone(), fx.audiobooks.clone());
        let ctx = RequestContext::member("u1");

        let view = handler
            .handle(&ctx, GetAudiobookStatus { book_id: fx.book.id })
            .await
            .unwrap();
        assert!(view.job.is_none());
        assert!(view.assets.is_empty());

        let job = AudiobookJob::new(fx.book.id, "alloy", "tts-1", 1.0, false);
        fx.audiobooks.create(&job).await.unwrap();
        let view = handler
            .handle(&ctx, GetAudiobookStatus { book_id: fx.book.id })
            .await
            .unwrap();
        assert_eq!(view.job.map(|j| j.id), Some(job.id));
    }

    #[tokio::test]
    async fn test_missing_auxiliary_audio_is_not_found() {
        let fx = fixture().await;
        let artifacts = tempfile::tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(artifacts.path(), "/media").await.unwrap());

        let err = GetAuxiliaryAudioHandler::new(fx.books.clone(), fx.audiobooks.clone(), store)
            .handle(
                &RequestContext::member("u1"),
                GetAuxiliaryAudio {
                    book_id: fx.book.id,
                    kind: AuxiliaryKind::OpeningCredits,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }
}
