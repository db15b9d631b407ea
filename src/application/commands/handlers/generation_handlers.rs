//! Generation Command Handlers
//!
//! 创建、重新排队、暂停生成任务；任务执行由后台 worker 负责

use std::sync::Arc;

use crate::application::commands::{PauseJob, RequeueJob, StartGeneration};
use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BookRepositoryPort, ChapterRepositoryPort, CreditGatePort, GenerationJobRepositoryPort,
    UsageRepositoryPort, WorkKind, WorkQueuePort,
};
use crate::domain::book::{Book, BookStatus};
use crate::domain::generation::{GenerationJob, JobState};
use crate::infrastructure::events::EventPublisher;

/// 生成相关设置
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// 未指定章节数时的默认值
    pub default_chapter_count: u32,
    /// 每次开始生成预留的额度
    pub credit_cost: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_chapter_count: 10,
            credit_cost: 1,
        }
    }
}

/// StartGeneration Handler
pub struct StartGenerationHandler {
    settings: GenerationSettings,
    book_repo: Arc<dyn BookRepositoryPort>,
    job_repo: Arc<dyn GenerationJobRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    usage_repo: Arc<dyn UsageRepositoryPort>,
    credit_gate: Arc<dyn CreditGatePort>,
    work_queue: Arc<dyn WorkQueuePort>,
    event_publisher: Arc<EventPublisher>,
}

impl StartGenerationHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: GenerationSettings,
        book_repo: Arc<dyn BookRepositoryPort>,
        job_repo: Arc<dyn GenerationJobRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        usage_repo: Arc<dyn UsageRepositoryPort>,
        credit_gate: Arc<dyn CreditGatePort>,
        work_queue: Arc<dyn WorkQueuePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            settings,
            book_repo,
            job_repo,
            chapter_repo,
            usage_repo,
            credit_gate,
            work_queue,
            event_publisher,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: StartGeneration) -> Result<GenerationJob, ApplicationError> {
        let book = self
            .book_repo
            .find_by_id(cmd.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", cmd.book_id))?;
        ctx.ensure_can_access(&book)?;

        if let Some(active) = self.job_repo.find_active_for_book(book.id).await? {
            return Err(ApplicationError::conflict(format!(
                "book {} already has an active job {} ({})",
                book.id,
                active.id,
                active.status().as_str()
            )));
        }
        if book.status == BookStatus::Generating {
            return Err(ApplicationError::conflict(format!(
                "book {} is already generating",
                book.id
            )));
        }

        let total_chapters = match (cmd.fresh, &book.outline, book.total_chapters) {
            (false, Some(_), Some(total)) => total,
            _ => book
                .context
                .resolved_chapter_count(self.settings.default_chapter_count),
        };

        let charged = ctx.is_quota_bound();
        if charged {
            self.credit_gate
                .reserve(&ctx.user_id, self.settings.credit_cost)
                .await?;
        }

        match self.create_job(&book, cmd.fresh, total_chapters).await {
            Ok(job) => {
                tracing::info!(
                    book_id = %book.id,
                    job_id = %job.id,
                    total_chapters = total_chapters,
                    fresh = cmd.fresh,
                    "Generation job created"
                );
                self.event_publisher.publish_job(&job);
                self.work_queue.wake(WorkKind::Generation);
                Ok(job)
            }
            Err(e) => {
                if charged {
                    if let Err(release_err) = self
                        .credit_gate
                        .release(&ctx.user_id, self.settings.credit_cost)
                        .await
                    {
                        tracing::error!(
                            user_id = %ctx.user_id,
                            error = %release_err,
                            "Failed to release credit reservation"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn create_job(
        &self,
        book: &Book,
        fresh: bool,
        total_chapters: u32,
    ) -> Result<GenerationJob, ApplicationError> {
        if fresh {
            let removed = self.chapter_repo.delete_for_book(book.id).await?;
            self.usage_repo.delete_for_book(book.id).await?;
            tracing::info!(book_id = %book.id, removed_chapters = removed, "Cleared previous chapters");
        }

        let job = GenerationJob::new(book.id, total_chapters);
        self.job_repo.create(&job).await?;

        // 只改写状态、章节数与（重新开始时）生成内容，不覆盖用户设置
        if let Err(e) = self.book_repo.begin_generation(book.id, total_chapters, fresh).await {
            if let Err(cleanup) = self
                .job_repo
                .update_job_status(job.id, JobState::failed(e.to_string()))
                .await
            {
                tracing::error!(job_id = %job.id, error = %cleanup, "Failed to abandon job");
            }
            return Err(e.into());
        }
        Ok(job)
    }
}

/// RequeueJob Handler
///
/// 重试按钮与管理员重新排队是同一个操作
pub struct RequeueJobHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    job_repo: Arc<dyn GenerationJobRepositoryPort>,
    work_queue: Arc<dyn WorkQueuePort>,
    event_publisher: Arc<EventPublisher>,
}

impl RequeueJobHandler {
    pub fn new(
        book_repo: Arc<dyn BookRepositoryPort>,
        job_repo: Arc<dyn GenerationJobRepositoryPort>,
        work_queue: Arc<dyn WorkQueuePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            book_repo,
            job_repo,
            work_queue,
            event_publisher,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: RequeueJob) -> Result<GenerationJob, ApplicationError> {
        let job = self
            .job_repo
            .find_by_id(cmd.job_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("GenerationJob", cmd.job_id))?;
        let book = self
            .book_repo
            .find_by_id(job.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", job.book_id))?;
        ctx.ensure_can_access(&book)?;

        if !job.status().accepts_requeue() {
            return Err(ApplicationError::invalid_transition(format!(
                "job {} cannot be requeued from {}",
                job.id,
                job.status().as_str()
            )));
        }
        // paused 任务本身也算活动任务
        if let Some(active) = self.job_repo.find_active_for_book(book.id).await? {
            if active.id != job.id {
                return Err(ApplicationError::conflict(format!(
                    "book {} already has an active job {}",
                    book.id, active.id
                )));
            }
        }

        // 唯一索引兜底并发重新排队
        let job = self.job_repo.update_job_status(job.id, JobState::Pending).await?;

        if book.status != BookStatus::Generating {
            self.book_repo
                .begin_generation(book.id, job.total_chapters, false)
                .await?;
        }

        tracing::info!(
            job_id = %job.id,
            book_id = %job.book_id,
            resume_from = job.current_chapter + 1,
            requested_by = %ctx.user_id,
            "Job requeued"
        );

        self.event_publisher.publish_job(&job);
        self.work_queue.wake(WorkKind::Generation);
        Ok(job)
    }
}

/// PauseJob Handler（仅管理员）
pub struct PauseJobHandler {
    job_repo: Arc<dyn GenerationJobRepositoryPort>,
    event_publisher: Arc<EventPublisher>,
}

impl PauseJobHandler {
    pub fn new(job_repo: Arc<dyn GenerationJobRepositoryPort>, event_publisher: Arc<EventPublisher>) -> Self {
        Self {
            job_repo,
            event_publisher,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: PauseJob) -> Result<GenerationJob, ApplicationError> {
        ctx.ensure_admin()?;
        let job = self.job_repo.update_job_status(cmd.job_id, JobState::Paused).await?;

        tracing::info!(job_id = %job.id, book_id = %job.book_id, "Job paused");
        self.event_publisher.publish_job(&job);
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use crate::application::ports::{CreditGatePort, RepositoryError};
    use crate::domain::book::{BookContext, BookTitle, BookType, Niche, Outline, OutlineEntry};
    use crate::domain::generation::{Chapter, JobStatus};
    use crate::infrastructure::memory::{ChannelWorkQueue, InMemoryCreditLedger, WakeReceivers};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookRepository, SqliteChapterRepository,
        SqliteGenerationJobRepository, SqliteUsageRepository,
    };

    /// 模拟并发创建：活动任务检查看不到对方，写入时才冲突
    struct RacingJobRepository {
        inner: Arc<SqliteGenerationJobRepository>,
    }

    #[async_trait]
    impl GenerationJobRepositoryPort for RacingJobRepository {
        async fn create(&self, job: &GenerationJob) -> Result<(), RepositoryError> {
            self.inner.create(job).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationJob>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_latest_for_book(&self, book_id: Uuid) -> Result<Option<GenerationJob>, RepositoryError> {
            self.inner.find_latest_for_book(book_id).await
        }

        async fn find_active_for_book(&self, _book_id: Uuid) -> Result<Option<GenerationJob>, RepositoryError> {
            Ok(None)
        }

        async fn list(&self, status: Option<JobStatus>) -> Result<Vec<GenerationJob>, RepositoryError> {
            self.inner.list(status).await
        }

        async fn save_state(&self, job: &GenerationJob, expected: JobStatus) -> Result<(), RepositoryError> {
            self.inner.save_state(job, expected).await
        }

        async fn claim_next(&self, worker_id: &str) -> Result<Option<GenerationJob>, RepositoryError> {
            self.inner.claim_next(worker_id).await
        }

        async fn heartbeat(&self, id: Uuid, worker_id: &str, claim_seq: u32) -> Result<(), RepositoryError> {
            self.inner.heartbeat(id, worker_id, claim_seq).await
        }

        async fn find_stale(&self, before: DateTime<Utc>) -> Result<Vec<GenerationJob>, RepositoryError> {
            self.inner.find_stale(before).await
        }
    }

    struct Fixture {
        books: Arc<SqliteBookRepository>,
        jobs: Arc<SqliteGenerationJobRepository>,
        chapters: Arc<SqliteChapterRepository>,
        usage: Arc<SqliteUsageRepository>,
        credits: Arc<InMemoryCreditLedger>,
        work_queue: Arc<ChannelWorkQueue>,
        wake: WakeReceivers,
        events: Arc<EventPublisher>,
    }

    async fn fixture(allowance: u32) -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let (work_queue, wake) = ChannelWorkQueue::new();
        Fixture {
            books: Arc::new(SqliteBookRepository::new(pool.clone())),
            jobs: Arc::new(SqliteGenerationJobRepository::new(pool.clone())),
            chapters: Arc::new(SqliteChapterRepository::new(pool.clone())),
            usage: Arc::new(SqliteUsageRepository::new(pool)),
            credits: InMemoryCreditLedger::new(true, allowance).arc(),
            work_queue: Arc::new(work_queue),
            wake,
            events: EventPublisher::new().arc(),
        }
    }

    impl Fixture {
        fn start_handler(&self) -> StartGenerationHandler {
            self.start_handler_with(self.jobs.clone())
        }

        fn start_handler_with(&self, jobs: Arc<dyn GenerationJobRepositoryPort>) -> StartGenerationHandler {
            StartGenerationHandler::new(
                GenerationSettings {
                    default_chapter_count: 6,
                    credit_cost: 1,
                },
                self.books.clone(),
                jobs,
                self.chapters.clone(),
                self.usage.clone(),
                self.credits.clone(),
                self.work_queue.clone(),
                self.events.clone(),
            )
        }

        fn requeue_handler(&self) -> RequeueJobHandler {
            RequeueJobHandler::new(
                self.books.clone(),
                self.jobs.clone(),
                self.work_queue.clone(),
                self.events.clone(),
            )
        }

        async fn draft_book(&self, owner: &str, context: BookContext) -> Book {
            let book = Book::new(
                owner,
                BookTitle::new("Tides of Copper").unwrap(),
                BookType::Novel,
                Niche::Fantasy,
                context,
                false,
            )
            .unwrap();
            self.books.save(&book).await.unwrap();
            book
        }
    }

    fn start(book_id: Uuid, fresh: bool) -> StartGeneration {
        StartGeneration { book_id, fresh }
    }

    #[tokio::test]
    async fn test_start_reserves_credit_and_wakes_worker() {
        let mut fx = fixture(2).await;
        let ctx = RequestContext::member("u1");
        let book = fx
            .draft_book(
                "u1",
                BookContext {
                    chapter_count: Some(4),
                    ..Default::default()
                },
            )
            .await;

        let job = fx.start_handler().handle(&ctx, start(book.id, false)).await.unwrap();

        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.total_chapters, 4);
        assert_eq!(fx.credits.balance("u1").await.unwrap(), 1);
        assert!(fx.wake.generation.try_recv().is_ok());

        let book = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(book.status, BookStatus::Generating);
        assert_eq!(book.total_chapters, Some(4));
    }

    #[tokio::test]
    async fn test_second_start_conflicts_without_charging() {
        let fx = fixture(5).await;
        let ctx = RequestContext::member("u1");
        let book = fx.draft_book("u1", BookContext::default()).await;
        let handler = fx.start_handler();

        handler.handle(&ctx, start(book.id, false)).await.unwrap();
        let err = handler.handle(&ctx, start(book.id, false)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Conflict(_)));
        assert_eq!(fx.credits.balance("u1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_conflict_on_create_releases_reservation() {
        let fx = fixture(5).await;
        let ctx = RequestContext::member("u1");
        let book = fx.draft_book("u1", BookContext::default()).await;
        fx.jobs.create(&GenerationJob::new(book.id, 6)).await.unwrap();

        let handler = fx.start_handler_with(Arc::new(RacingJobRepository {
            inner: fx.jobs.clone(),
        }));
        let err = handler.handle(&ctx, start(book.id, false)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Conflict(_)));
        assert_eq!(fx.credits.balance("u1").await.unwrap(), 5);
        let book = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(book.status, BookStatus::Draft);
    }

    #[tokio::test]
    async fn test_member_without_credits_is_rejected() {
        let fx = fixture(0).await;
        let book = fx.draft_book("u1", BookContext::default()).await;

        let err = fx
            .start_handler()
            .handle(&RequestContext::member("u1"), start(book.id, false))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::InsufficientCredits {
                required: 1,
                available: 0
            }
        ));
        assert!(fx.jobs.find_active_for_book(book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_is_not_charged_and_may_start_any_book() {
        let fx = fixture(0).await;
        let book = fx.draft_book("u1", BookContext::default()).await;

        fx.start_handler()
            .handle(&RequestContext::admin("root"), start(book.id, false))
            .await
            .unwrap();

        let err = fx
            .start_handler()
            .handle(&RequestContext::member("u2"), start(book.id, false))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_resume_keeps_outline_total_and_fresh_clears_content() {
        let fx = fixture(5).await;
        let ctx = RequestContext::member("u1");
        let mut book = fx.draft_book("u1", BookContext::default()).await;
        book.start_generation(3).unwrap();
        book.outline = Some(Outline {
            entries: (1..=3)
                .map(|n| OutlineEntry {
                    number: n,
                    title: format!("Part {}", n),
                    summary: String::new(),
                })
                .collect(),
        });
        book.finish_generation().unwrap();
        fx.books.save(&book).await.unwrap();
        fx.chapters.upsert(&Chapter::new(book.id, 1, "Part 1")).await.unwrap();

        let job = fx.start_handler().handle(&ctx, start(book.id, false)).await.unwrap();
        assert_eq!(job.total_chapters, 3);
        assert_eq!(fx.chapters.find_by_book(book.id).await.unwrap().len(), 1);

        // 结束该任务后重新生成
        fx.jobs
            .update_job_status(job.id, JobState::failed("stopped"))
            .await
            .unwrap();
        let mut book = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        book.fail_generation().unwrap();
        fx.books.save(&book).await.unwrap();

        let job = fx.start_handler().handle(&ctx, start(book.id, true)).await.unwrap();
        assert_eq!(job.total_chapters, 6);
        assert!(fx.chapters.find_by_book(book.id).await.unwrap().is_empty());
        let book = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        assert!(book.outline.is_none());
    }

    #[tokio::test]
    async fn test_requeue_failed_job_returns_book_to_generating() {
        let fx = fixture(5).await;
        let ctx = RequestContext::member("u1");
        let book = fx.draft_book("u1", BookContext::default()).await;
        let job = fx.start_handler().handle(&ctx, start(book.id, false)).await.unwrap();

        fx.jobs
            .update_job_status(job.id, JobState::failed("upstream timeout"))
            .await
            .unwrap();
        let mut stored = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        stored.fail_generation().unwrap();
        fx.books.save(&stored).await.unwrap();

        let requeued = fx
            .requeue_handler()
            .handle(&ctx, RequeueJob { job_id: job.id })
            .await
            .unwrap();

        assert_eq!(requeued.status(), JobStatus::Pending);
        assert!(requeued.error().is_none());
        let stored = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookStatus::Generating);
    }

    #[tokio::test]
    async fn test_requeue_conflicts_with_newer_active_job() {
        let fx = fixture(5).await;
        let ctx = RequestContext::member("u1");
        let book = fx.draft_book("u1", BookContext::default()).await;
        let first = fx.start_handler().handle(&ctx, start(book.id, false)).await.unwrap();
        fx.jobs
            .update_job_status(first.id, JobState::failed("upstream timeout"))
            .await
            .unwrap();
        let mut stored = fx.books.find_by_id(book.id).await.unwrap().unwrap();
        stored.fail_generation().unwrap();
        fx.books.save(&stored).await.unwrap();

        fx.start_handler().handle(&ctx, start(book.id, false)).await.unwrap();

        let err = fx
            .requeue_handler()
            .handle(&ctx, RequeueJob { job_id: first.id })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Conflict(_)));
        let first = fx.jobs.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(first.status(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_requeue_pending_job_is_invalid() {
        let fx = fixture(5).await;
        let ctx = RequestContext::member("u1");
        let book = fx.draft_book("u1", BookContext::default()).await;
        let job = fx.start_handler().handle(&ctx, start(book.id, false)).await.unwrap();

        let err = fx
            .requeue_handler()
            .handle(&ctx, RequeueJob { job_id: job.id })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_pause_requires_admin() {
        let fx = fixture(5).await;
        let book = fx.draft_book("u1", BookContext::default()).await;
        let job = fx
            .start_handler()
            .handle(&RequestContext::member("u1"), start(book.id, false))
            .await
            .unwrap();
        let handler = PauseJobHandler::new(fx.jobs.clone(), fx.events.clone());

        let err = handler
            .handle(&RequestContext::member("u1"), PauseJob { job_id: job.id })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));

        let paused = handler
            .handle(&RequestContext::admin("root"), PauseJob { job_id: job.id })
            .await
            .unwrap();
        assert_eq!(paused.status(), JobStatus::Paused);
    }
}
