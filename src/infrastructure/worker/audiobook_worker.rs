//! Audiobook Worker - Audiobook Orchestrator
//!
//! 按章节顺序合成音频，已有进度的章节在非强制模式下跳过
//! 取消是协作式的：每章开始前检查本次认领是否仍在执行，写入进度与结束状态都以认领序号为条件

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AudiobookRepositoryPort, ChapterRepositoryPort};
use crate::application::{ApplicationError, Narrator};
use crate::domain::audiobook::{AudiobookJob, AudiobookState, AudiobookStatus};
use crate::infrastructure::events::EventPublisher;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct AudiobookWorkerConfig {
    pub poll_interval: Duration,
    pub max_concurrent_jobs: usize,
}

impl Default for AudiobookWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_concurrent_jobs: 1,
        }
    }
}

/// 单个任务的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudiobookOutcome {
    Complete,
    Failed,
    /// 执行中观察到任务已不再是 generating（通常是被取消）
    Interrupted,
}

/// Audiobook Orchestrator
pub struct AudiobookOrchestrator {
    narrator: Arc<Narrator>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
    event_publisher: Arc<EventPublisher>,
}

impl AudiobookOrchestrator {
    pub fn new(
        narrator: Arc<Narrator>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            narrator,
            chapter_repo,
            audiobook_repo,
            event_publisher,
        }
    }

    pub async fn claim(&self) -> Result<Option<AudiobookJob>, ApplicationError> {
        let job = self.audiobook_repo.claim_next().await?;
        if let Some(job) = &job {
            self.event_publisher.publish_audiobook(job);
        }
        Ok(job)
    }

    /// 认领并同步执行一个任务
    pub async fn run_next(&self) -> Result<Option<AudiobookOutcome>, ApplicationError> {
        match self.claim().await? {
            Some(job) => Ok(Some(self.run_job(job).await)),
            None => Ok(None),
        }
    }

    pub async fn run_job(&self, mut job: AudiobookJob) -> AudiobookOutcome {
        tracing::info!(
            job_id = %job.id,
            book_id = %job.book_id,
            voice = %job.voice,
            model = %job.model,
            force_regenerate = job.force_regenerate,
            existing_segments = job.progress.len(),
            "Audiobook job started"
        );

        match self.synthesize_chapters(&mut job).await {
            Ok(true) => self.finish(&mut job, AudiobookState::complete()).await,
            Ok(false) => {
                tracing::info!(
                    job_id = %job.id,
                    current_chapter = job.current_chapter,
                    "Audiobook job no longer generating, stopping"
                );
                AudiobookOutcome::Interrupted
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    current_chapter = job.current_chapter,
                    error = %e,
                    "Audiobook job failed"
                );
                self.finish(&mut job, AudiobookState::failed(e.to_string())).await
            }
        }
    }

    /// 返回 false 表示任务在执行中被改写
    async fn synthesize_chapters(&self, job: &mut AudiobookJob) -> Result<bool, ApplicationError> {
        let chapters = self.chapter_repo.find_by_book(job.book_id).await?;

        for chapter in chapters {
            if !chapter.has_text() {
                tracing::debug!(job_id = %job.id, chapter = chapter.number, "Chapter has no text, skipping");
                continue;
            }
            if !job.needs_synthesis(chapter.number) {
                tracing::debug!(job_id = %job.id, chapter = chapter.number, "Chapter audio exists, skipping");
                continue;
            }

            // 每章开始前检查取消或重新认领
            if !self.audiobook_repo.is_running(job.id, job.claim_seq).await? {
                return Ok(false);
            }

            let segment = self.narrator.narrate_chapter(job, &chapter).await?;

            let written = self
                .audiobook_repo
                .record_segment(job.id, chapter.number, &segment, AudiobookStatus::Generating, job.claim_seq)
                .await?;
            if !written {
                // 合成期间被取消或已由新的认领接手，结果丢弃
                return Ok(false);
            }

            tracing::info!(
                job_id = %job.id,
                chapter = chapter.number,
                characters = segment.characters,
                cost = segment.cost,
                "Chapter audio synthesized"
            );
            job.record_segment(chapter.number, segment);
            self.event_publisher.publish_audiobook(job);
        }
        Ok(true)
    }

    async fn finish(&self, job: &mut AudiobookJob, next: AudiobookState) -> AudiobookOutcome {
        let outcome = match next.status() {
            AudiobookStatus::Complete => AudiobookOutcome::Complete,
            _ => AudiobookOutcome::Failed,
        };

        let mut updated = job.clone();
        if let Err(e) = updated.transition(next) {
            tracing::warn!(job_id = %job.id, error = %e, "Invalid audiobook transition");
            return AudiobookOutcome::Interrupted;
        }
        match self
            .audiobook_repo
            .save_state(&updated, &[AudiobookStatus::Generating])
            .await
        {
            Ok(()) => {
                *job = updated;
                tracing::info!(
                    job_id = %job.id,
                    status = job.status().as_str(),
                    actual_cost = job.actual_cost,
                    "Audiobook job finished"
                );
                self.event_publisher.publish_audiobook(job);
                outcome
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Audiobook job changed before it could finish");
                AudiobookOutcome::Interrupted
            }
        }
    }
}

/// 有声书任务的后台循环
pub struct AudiobookWorker {
    config: AudiobookWorkerConfig,
    orchestrator: Arc<AudiobookOrchestrator>,
    wake_receiver: mpsc::Receiver<()>,
}

impl AudiobookWorker {
    pub fn new(
        config: AudiobookWorkerConfig,
        orchestrator: Arc<AudiobookOrchestrator>,
        wake_receiver: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            wake_receiver,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            max_concurrent = self.config.max_concurrent_jobs,
            "AudiobookWorker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));

        loop {
            self.dispatch(&semaphore).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(()) = self.wake_receiver.recv() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        let _ = semaphore
            .acquire_many(self.config.max_concurrent_jobs as u32)
            .await;
        tracing::info!("AudiobookWorker stopped");
    }

    async fn dispatch(&self, semaphore: &Arc<Semaphore>) {
        loop {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                return;
            };

            match self.orchestrator.claim().await {
                Ok(Some(job)) => {
                    let orchestrator = self.orchestrator.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        orchestrator.run_job(job).await;
                    });
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim audiobook job");
                    return;
                }
            }
        }
    }
}
