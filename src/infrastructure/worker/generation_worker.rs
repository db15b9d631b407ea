//! Generation Worker - Generation Scheduler
//!
//! 认领待执行的生成任务，依次执行 大纲 -> 章节 -> 封面 三个阶段
//! 每章完成后立即持久化进度，崩溃最多损失一个进行中的章节
//! 任务写入以认领序号为条件；书籍只按列更新状态、大纲与空缺的封面字段

use chrono::Utc;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{
    ArtifactStorePort, BookRepositoryPort, ChapterRepositoryPort, GenerationJobRepositoryPort,
    ImageGeneratorPort, TextGeneratorPort, UsageRepositoryPort,
};
use crate::application::{generated_cover_key, ApplicationError};
use crate::domain::book::{Book, BookStatus, Outline};
use crate::domain::generation::{GenerationJob, JobState, JobStatus, TokenUsage, UsageEntry, UsageStep};
use crate::domain::text::{parse_outline, summarize};
use crate::infrastructure::events::EventPublisher;

use super::chapter_pipeline::{ChapterPipeline, ChapterPipelineConfig};
use super::prompts::{self, SUMMARY_CHARS};

/// 心跳过期的任务失败时记录的错误
pub const HEARTBEAT_EXPIRED: &str = "worker heartbeat expired";

/// Worker 配置
#[derive(Debug, Clone)]
pub struct GenerationWorkerConfig {
    /// 写入 worker_id 列，用于心跳
    pub worker_id: String,
    /// 无唤醒信号时的轮询间隔
    pub poll_interval: Duration,
    /// 最大并发任务数
    pub max_concurrent_jobs: usize,
    /// 心跳超过该时长视为 worker 已失效
    pub stale_after: Duration,
    /// 是否生成章节插图与封面图
    pub chapter_images: bool,
}

impl Default for GenerationWorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-1".to_string(),
            poll_interval: Duration::from_secs(5),
            max_concurrent_jobs: 2,
            stale_after: Duration::from_secs(900),
            chapter_images: true,
        }
    }
}

/// 外部生成协作者
#[derive(Clone)]
pub struct GenerationCollaborators {
    pub text_generator: Arc<dyn TextGeneratorPort>,
    pub image_generator: Arc<dyn ImageGeneratorPort>,
    pub artifact_store: Arc<dyn ArtifactStorePort>,
}

/// Generation Scheduler
///
/// 单个任务的执行不会向外抛错：协作者失败转换为任务的 failed 状态
pub struct GenerationScheduler {
    config: GenerationWorkerConfig,
    collaborators: GenerationCollaborators,
    pipeline: ChapterPipeline,
    book_repo: Arc<dyn BookRepositoryPort>,
    job_repo: Arc<dyn GenerationJobRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    usage_repo: Arc<dyn UsageRepositoryPort>,
    event_publisher: Arc<EventPublisher>,
    /// 本进程正在执行的任务，不参与过期回收
    running: DashSet<Uuid>,
}

impl GenerationScheduler {
    pub fn new(
        config: GenerationWorkerConfig,
        collaborators: GenerationCollaborators,
        book_repo: Arc<dyn BookRepositoryPort>,
        job_repo: Arc<dyn GenerationJobRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        usage_repo: Arc<dyn UsageRepositoryPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        let pipeline = ChapterPipeline::new(
            ChapterPipelineConfig {
                chapter_images: config.chapter_images,
            },
            collaborators.text_generator.clone(),
            collaborators.image_generator.clone(),
            collaborators.artifact_store.clone(),
            chapter_repo.clone(),
            usage_repo.clone(),
            event_publisher.clone(),
        );
        Self {
            config,
            collaborators,
            pipeline,
            book_repo,
            job_repo,
            chapter_repo,
            usage_repo,
            event_publisher,
            running: DashSet::new(),
        }
    }

    pub fn config(&self) -> &GenerationWorkerConfig {
        &self.config
    }

    /// 原子认领最早的 pending 任务
    pub async fn claim(&self) -> Result<Option<GenerationJob>, ApplicationError> {
        let job = self.job_repo.claim_next(&self.config.worker_id).await?;
        if let Some(job) = &job {
            self.running.insert(job.id);
            self.event_publisher.publish_job(job);
        }
        Ok(job)
    }

    /// 认领并同步执行一个任务，没有可执行任务时返回 false
    pub async fn run_next(&self) -> Result<bool, ApplicationError> {
        match self.claim().await? {
            Some(job) => {
                self.run_job(job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 执行已认领的任务直到终态
    pub async fn run_job(&self, mut job: GenerationJob) {
        let job_id = job.id;
        tracing::info!(
            job_id = %job_id,
            book_id = %job.book_id,
            status = job.status().as_str(),
            resume_from = job.current_chapter + 1,
            total_chapters = job.total_chapters,
            "Generation job started"
        );

        match self.drive(&mut job).await {
            Ok(()) => {
                tracing::info!(job_id = %job_id, book_id = %job.book_id, "Generation job complete");
            }
            Err(e) => self.fail_job(&mut job, e).await,
        }

        self.running.remove(&job_id);
    }

    /// 将心跳过期的已认领任务标记为失败
    pub async fn recover_stale(&self) -> Result<usize, ApplicationError> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .map_err(|e| ApplicationError::internal(format!("invalid stale_after: {}", e)))?;
        let stale = self.job_repo.find_stale(Utc::now() - stale_after).await?;

        let mut recovered = 0;
        for mut job in stale {
            if self.running.contains(&job.id) {
                continue;
            }
            tracing::warn!(
                job_id = %job.id,
                book_id = %job.book_id,
                worker_id = ?job.worker_id,
                status = job.status().as_str(),
                "Recovering stale job"
            );
            match self.move_to(&mut job, JobState::failed(HEARTBEAT_EXPIRED)).await {
                Ok(()) => {
                    self.fail_book(job.book_id).await;
                    recovered += 1;
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "Stale job changed before recovery");
                }
            }
        }
        Ok(recovered)
    }

    async fn drive(&self, job: &mut GenerationJob) -> Result<(), ApplicationError> {
        if job.status() == JobStatus::GeneratingOutline {
            self.generate_outline(job).await?;
            self.move_to(job, JobState::OutlineComplete).await?;
        }
        if job.status() == JobStatus::OutlineComplete {
            self.move_to(job, JobState::GeneratingChapters).await?;
        }
        if job.status() != JobStatus::GeneratingChapters {
            return Err(ApplicationError::invalid_transition(format!(
                "job {} cannot run from {}",
                job.id,
                job.status().as_str()
            )));
        }

        self.generate_chapters(job).await?;
        self.finalize(job).await?;

        self.move_to(job, JobState::complete()).await?;
        if !self.book_repo.end_generation(job.book_id, BookStatus::Complete).await? {
            tracing::warn!(book_id = %job.book_id, "Book was not generating when job completed");
        }
        Ok(())
    }

    async fn generate_outline(&self, job: &GenerationJob) -> Result<(), ApplicationError> {
        let book = self.load_book(job.book_id).await?;
        let prompt = prompts::outline(&book, job.total_chapters);
        let output = self.collaborators.text_generator.generate_text(&prompt).await?;
        self.record_usage(job, UsageStep::Outline, output.usage).await?;

        let mut entries = parse_outline(&output.content);
        if entries.len() < job.total_chapters as usize {
            return Err(ApplicationError::UpstreamGeneration(format!(
                "outline has {} chapters, expected {}",
                entries.len(),
                job.total_chapters
            )));
        }
        entries.truncate(job.total_chapters as usize);

        self.book_repo.set_outline(job.book_id, &Outline { entries }).await?;

        tracing::info!(job_id = %job.id, book_id = %job.book_id, chapters = job.total_chapters, "Outline generated");
        Ok(())
    }

    async fn generate_chapters(&self, job: &mut GenerationJob) -> Result<(), ApplicationError> {
        let book = self.load_book(job.book_id).await?;
        let outline = book
            .outline
            .clone()
            .ok_or_else(|| ApplicationError::internal(format!("book {} has no outline", book.id)))?;

        let mut previous_summary = match job.current_chapter {
            0 => None,
            n => self
                .chapter_repo
                .find(book.id, n)
                .await?
                .and_then(|ch| ch.text)
                .map(|text| summarize(&text, SUMMARY_CHARS)),
        };

        for number in job.current_chapter + 1..=job.total_chapters {
            self.job_repo
                .heartbeat(job.id, &self.config.worker_id, job.claim_seq)
                .await?;

            let entry = outline.entry(number).ok_or_else(|| {
                ApplicationError::internal(format!("outline of book {} has no chapter {}", book.id, number))
            })?;
            let chapter = self
                .pipeline
                .run(&book, job, entry, previous_summary.as_deref())
                .await?;
            previous_summary = chapter.text.as_deref().map(|t| summarize(t, SUMMARY_CHARS));

            let mut updated = job.clone();
            updated.advance_to(number)?;
            self.job_repo.save_state(&updated, JobStatus::GeneratingChapters).await?;
            *job = updated;
            self.event_publisher.publish_job(job);

            tracing::info!(
                job_id = %job.id,
                chapter = number,
                total_chapters = job.total_chapters,
                percent = job.percent(),
                "Chapter progress saved"
            );
        }
        Ok(())
    }

    /// 封面提示词与封面图，已有的跳过
    ///
    /// 只填补空缺，生成期间用户写入的提示词或上传的封面保持不变
    async fn finalize(&self, job: &GenerationJob) -> Result<(), ApplicationError> {
        let mut book = self.load_book(job.book_id).await?;

        if is_blank(book.cover_image_prompt.as_deref()) {
            let output = self
                .collaborators
                .text_generator
                .generate_text(&prompts::cover_prompt(&book))
                .await?;
            self.record_usage(job, UsageStep::CoverPrompt, output.usage).await?;
            let prompt = output.content.trim();
            if !self.book_repo.fill_cover_image_prompt(book.id, prompt).await? {
                tracing::debug!(book_id = %book.id, "Cover prompt was set meanwhile, keeping it");
            }
            book = self.load_book(job.book_id).await?;
        }

        if self.config.chapter_images && is_blank(book.cover_image_url.as_deref()) {
            if let Some(prompt) = book.cover_image_prompt.clone() {
                let image = self.collaborators.image_generator.generate_image(&prompt).await?;
                self.record_usage(job, UsageStep::CoverImage, image.usage.clone()).await?;
                let url = self
                    .collaborators
                    .artifact_store
                    .put(&generated_cover_key(book.id, &image.extension), &image.data)
                    .await?;
                if self.book_repo.fill_cover_image_url(book.id, &url).await? {
                    tracing::info!(job_id = %job.id, book_id = %book.id, "Cover image generated");
                } else {
                    tracing::info!(job_id = %job.id, book_id = %book.id, "Cover uploaded meanwhile, keeping it");
                }
            }
        }
        Ok(())
    }

    async fn fail_job(&self, job: &mut GenerationJob, error: ApplicationError) {
        let message = error.to_string();
        tracing::error!(
            job_id = %job.id,
            book_id = %job.book_id,
            current_chapter = job.current_chapter,
            error = %message,
            "Generation job failed"
        );

        if let Err(e) = self.move_to(job, JobState::failed(message)).await {
            // 已被过期回收或其他 worker 改写
            tracing::warn!(job_id = %job.id, error = %e, "Could not record job failure");
            return;
        }
        self.fail_book(job.book_id).await;
    }

    async fn fail_book(&self, book_id: Uuid) {
        match self.book_repo.end_generation(book_id, BookStatus::Failed).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(book_id = %book_id, "Book was not generating, status kept"),
            Err(e) => tracing::error!(book_id = %book_id, error = %e, "Failed to mark book failed"),
        }
    }

    /// 状态迁移，CAS 成功后才更新内存中的任务
    async fn move_to(&self, job: &mut GenerationJob, next: JobState) -> Result<(), ApplicationError> {
        let expected = job.status();
        let mut updated = job.clone();
        updated.transition(next)?;
        self.job_repo.save_state(&updated, expected).await?;
        *job = updated;

        tracing::debug!(
            job_id = %job.id,
            from = expected.as_str(),
            to = job.status().as_str(),
            "Job state changed"
        );
        self.event_publisher.publish_job(job);
        Ok(())
    }

    async fn load_book(&self, book_id: Uuid) -> Result<Book, ApplicationError> {
        self.book_repo
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", book_id))
    }

    async fn record_usage(&self, job: &GenerationJob, step: UsageStep, usage: TokenUsage) -> Result<(), ApplicationError> {
        let entry = UsageEntry::new(job.book_id, Some(job.id), None, step, usage);
        self.usage_repo.append(&entry).await?;
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// 生成任务的后台循环
///
/// 收到唤醒信号或轮询间隔到期时认领任务，直到并发上限
pub struct GenerationWorker {
    scheduler: Arc<GenerationScheduler>,
    wake_receiver: mpsc::Receiver<()>,
}

impl GenerationWorker {
    pub fn new(scheduler: Arc<GenerationScheduler>, wake_receiver: mpsc::Receiver<()>) -> Self {
        Self {
            scheduler,
            wake_receiver,
        }
    }

    /// 启动 Worker，shutdown 触发后等待进行中的任务结束
    pub async fn run(mut self, shutdown: CancellationToken) {
        let config = self.scheduler.config().clone();
        tracing::info!(
            worker_id = %config.worker_id,
            max_concurrent = config.max_concurrent_jobs,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "GenerationWorker started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));

        loop {
            match self.scheduler.recover_stale().await {
                Ok(0) => {}
                Ok(count) => tracing::warn!(count, "Stale jobs marked failed"),
                Err(e) => tracing::error!(error = %e, "Stale job recovery failed"),
            }

            self.dispatch(&semaphore).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(()) = self.wake_receiver.recv() => {}
                _ = tokio::time::sleep(config.poll_interval) => {}
            }
        }

        let in_flight = config.max_concurrent_jobs - semaphore.available_permits();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight generation jobs");
        }
        // 拿回全部 permit 即所有任务都已结束
        let _ = semaphore.acquire_many(config.max_concurrent_jobs as u32).await;

        tracing::info!("GenerationWorker stopped");
    }

    async fn dispatch(&self, semaphore: &Arc<Semaphore>) {
        loop {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                return;
            };

            match self.scheduler.claim().await {
                Ok(Some(job)) => {
                    let scheduler = self.scheduler.clone();
                    tokio::spawn(async move {
                        let _permit = permit; // 持有 permit 直到任务完成
                        scheduler.run_job(job).await;
                    });
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim generation job");
                    return;
                }
            }
        }
    }
}
