//! Progress Query Handlers
//!
//! 只读投影：每次调用都重新读取任务与章节快照

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BookRepositoryPort, ChapterRepositoryPort, GenerationJobRepositoryPort, UsageRepositoryPort,
};
use crate::application::queries::{GetGenerationProgress, GetPublishStatus, ListJobs};
use crate::domain::book::Book;
use crate::domain::generation::{Chapter, GenerationJob, UsageEntry, UsageSummary};
use crate::domain::{evaluate, PublishStatus};

// ============================================================================
// Response DTOs
// ============================================================================

/// 生成进度快照
#[derive(Debug, Clone, Serialize)]
pub struct GenerationProgress {
    pub book: Book,
    pub job: Option<GenerationJob>,
    pub percent: u8,
    pub token_usage: UsageSummary,
    pub chapters: Vec<Chapter>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetGenerationProgress Handler
pub struct GetGenerationProgressHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    job_repo: Arc<dyn GenerationJobRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    usage_repo: Arc<dyn UsageRepositoryPort>,
}

impl GetGenerationProgressHandler {
    pub fn new(
        book_repo: Arc<dyn BookRepositoryPort>,
        job_repo: Arc<dyn GenerationJobRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        usage_repo: Arc<dyn UsageRepositoryPort>,
    ) -> Self {
        Self {
            book_repo,
            job_repo,
            chapter_repo,
            usage_repo,
        }
    }

    pub async fn handle(
        &self,
        ctx: &RequestContext,
        query: GetGenerationProgress,
    ) -> Result<GenerationProgress, ApplicationError> {
        let book = self
            .book_repo
            .find_by_id(query.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", query.book_id))?;
        ctx.ensure_can_access(&book)?;

        let job = self.job_repo.find_latest_for_book(book.id).await?;
        let mut chapters = self.chapter_repo.find_by_book(book.id).await?;
        let usage = self.usage_repo.find_by_book(book.id).await?;

        let token_usage = match &job {
            Some(job) => UsageSummary::from_entries(usage.iter().filter(|e| e.job_id == Some(job.id))),
            None => UsageSummary::default(),
        };

        let mut by_chapter: HashMap<u32, Vec<UsageEntry>> = HashMap::new();
        for entry in usage {
            if let Some(number) = entry.chapter_number {
                by_chapter.entry(number).or_default().push(entry);
            }
        }
        for chapter in chapters.iter_mut() {
            chapter.token_usage = by_chapter.remove(&chapter.number).unwrap_or_default();
        }

        Ok(GenerationProgress {
            percent: job.as_ref().map(|j| j.percent()).unwrap_or(0),
            book,
            job,
            token_usage,
            chapters,
        })
    }
}

/// ListJobs Handler（仅管理员）
pub struct ListJobsHandler {
    job_repo: Arc<dyn GenerationJobRepositoryPort>,
}

impl ListJobsHandler {
    pub fn new(job_repo: Arc<dyn GenerationJobRepositoryPort>) -> Self {
        Self { job_repo }
    }

    pub async fn handle(&self, ctx: &RequestContext, query: ListJobs) -> Result<Vec<GenerationJob>, ApplicationError> {
        ctx.ensure_admin()?;
        Ok(self.job_repo.list(query.status).await?)
    }
}

/// GetPublishStatus Handler
pub struct GetPublishStatusHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
}

impl GetPublishStatusHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>, chapter_repo: Arc<dyn ChapterRepositoryPort>) -> Self {
        Self {
            book_repo,
            chapter_repo,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, query: GetPublishStatus) -> Result<PublishStatus, ApplicationError> {
        let book = self
            .book_repo
            .find_by_id(query.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", query.book_id))?;
        ctx.ensure_can_access(&book)?;
        let chapters = self.chapter_repo.find_by_book(book.id).await?;
        Ok(evaluate(&book, &chapters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookContext, BookTitle, BookType, Niche};
    use crate::domain::generation::{JobState, JobStatus, TokenUsage, UsageStep};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookRepository, SqliteChapterRepository,
        SqliteGenerationJobRepository, SqliteUsageRepository,
    };
    use uuid::Uuid;

    struct Fixture {
        books: Arc<SqliteBookRepository>,
        jobs: Arc<SqliteGenerationJobRepository>,
        chapters: Arc<SqliteChapterRepository>,
        usage: Arc<SqliteUsageRepository>,
    }

    async fn fixture() -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Fixture {
            books: Arc::new(SqliteBookRepository::new(pool.clone())),
            jobs: Arc::new(SqliteGenerationJobRepository::new(pool.clone())),
            chapters: Arc::new(SqliteChapterRepository::new(pool.clone())),
            usage: Arc::new(SqliteUsageRepository::new(pool)),
        }
    }

    impl Fixture {
        fn progress_handler(&self) -> GetGenerationProgressHandler {
            GetGenerationProgressHandler::new(
                self.books.clone(),
                self.jobs.clone(),
                self.chapters.clone(),
                self.usage.clone(),
            )
        }

        async fn book(&self) -> Book {
            let book = Book::new(
                "u1",
                BookTitle::new("Quiet Engines").unwrap(),
                BookType::Novel,
                Niche::Fantasy,
                BookContext::default(),
                true,
            )
            .unwrap();
            self.books.save(&book).await.unwrap();
            book
        }

        async fn record(&self, book_id: Uuid, job_id: Uuid, chapter: Option<u32>, step: UsageStep, units: u64) {
            let entry = UsageEntry::new(
                book_id,
                Some(job_id),
                chapter,
                step,
                TokenUsage {
                    prompt_units: units,
                    completion_units: 0,
                    cost: 0.0,
                },
            );
            self.usage.append(&entry).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_progress_without_job() {
        let fx = fixture().await;
        let book = fx.book().await;

        let progress = fx
            .progress_handler()
            .handle(&RequestContext::member("u1"), GetGenerationProgress { book_id: book.id })
            .await
            .unwrap();

        assert!(progress.job.is_none());
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.token_usage.total_units, 0);
        assert!(progress.chapters.is_empty());
    }

    #[tokio::test]
    async fn test_progress_sums_latest_job_and_attaches_chapter_usage() {
        let fx = fixture().await;
        let book = fx.book().await;

        let mut old_job = GenerationJob::new(book.id, 2);
        fx.jobs.create(&old_job).await.unwrap();
        old_job.transition(JobState::failed("boom")).unwrap();
        fx.jobs.save_state(&old_job, JobStatus::Pending).await.unwrap();
        fx.record(book.id, old_job.id, None, UsageStep::Outline, 100).await;

        let job = GenerationJob::new(book.id, 2);
        fx.jobs.create(&job).await.unwrap();
        fx.record(book.id, job.id, None, UsageStep::Outline, 10).await;
        fx.record(book.id, job.id, Some(1), UsageStep::ChapterText, 5).await;
        fx.chapters.upsert(&Chapter::new(book.id, 1, "Boilers")).await.unwrap();

        let progress = fx
            .progress_handler()
            .handle(&RequestContext::member("u1"), GetGenerationProgress { book_id: book.id })
            .await
            .unwrap();

        assert_eq!(progress.job.as_ref().map(|j| j.id), Some(job.id));
        assert_eq!(progress.token_usage.total_units, 15);
        assert_eq!(progress.chapters.len(), 1);
        assert_eq!(progress.chapters[0].token_usage.len(), 1);
        assert_eq!(progress.chapters[0].token_usage[0].step, UsageStep::ChapterText);
    }

    #[tokio::test]
    async fn test_progress_hidden_from_other_members() {
        let fx = fixture().await;
        let book = fx.book().await;

        let err = fx
            .progress_handler()
            .handle(&RequestContext::member("u2"), GetGenerationProgress { book_id: book.id })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_list_jobs_admin_only_with_filter() {
        let fx = fixture().await;
        let book = fx.book().await;
        fx.jobs.create(&GenerationJob::new(book.id, 3)).await.unwrap();
        let handler = ListJobsHandler::new(fx.jobs.clone());

        let err = handler
            .handle(&RequestContext::member("u1"), ListJobs { status: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));

        let admin = RequestContext::admin("root");
        let pending = handler
            .handle(&admin, ListJobs { status: Some(JobStatus::Pending) })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        let failed = handler
            .handle(&admin, ListJobs { status: Some(JobStatus::Failed) })
            .await
            .unwrap();
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn test_publish_status_for_empty_book() {
        let fx = fixture().await;
        let book = fx.book().await;

        let status = GetPublishStatusHandler::new(fx.books.clone(), fx.chapters.clone())
            .handle(&RequestContext::member("u1"), GetPublishStatus { book_id: book.id })
            .await
            .unwrap();
        assert!(!status.ready);
        assert_eq!(status.issues, vec!["Outline has not been generated".to_string()]);
    }
}
