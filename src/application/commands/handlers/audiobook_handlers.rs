//! Audiobook Command Handlers
//!
//! 开始/恢复、取消、单章重新合成、附加音频
//! 章节循环由后台 worker 执行，这里只创建任务和处理一次性合成

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::{
    CancelAudiobook, GenerateAuxiliaryAudio, RegenerateChapterAudio, StartAudiobook,
};
use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactStorePort, AudiobookRepositoryPort, BookRepositoryPort, ChapterRepositoryPort,
    SpeechRequest, SpeechSynthesizerPort, WorkKind, WorkQueuePort,
};
use crate::domain::audiobook::{
    billable_characters, estimate, AudioSegment, AudiobookJob, AuxiliaryAsset, RateTable,
};
use crate::domain::book::{Book, BookStatus};
use crate::domain::generation::Chapter;
use crate::infrastructure::events::EventPublisher;

/// 有声书设置
#[derive(Debug, Clone)]
pub struct AudiobookSettings {
    /// 允许的音色
    pub voices: Vec<String>,
    pub default_voice: String,
    pub default_model: String,
    pub rates: RateTable,
    /// 试听片段最大字符数
    pub sample_characters: usize,
}

impl AudiobookSettings {
    pub fn resolve_voice(&self, voice: Option<&str>) -> Result<String, ApplicationError> {
        let voice = voice.unwrap_or(&self.default_voice).trim();
        if self.voices.iter().any(|v| v == voice) {
            Ok(voice.to_string())
        } else {
            Err(ApplicationError::validation(format!("unknown voice: {}", voice)))
        }
    }

    /// 返回 (model, 每字符费率)
    pub fn resolve_model(&self, model: Option<&str>) -> Result<(String, f64), ApplicationError> {
        let model = model.unwrap_or(&self.default_model).trim();
        self.rates
            .rate(model)
            .map(|rate| (model.to_string(), rate))
            .ok_or_else(|| ApplicationError::validation(format!("unknown speech model: {}", model)))
    }
}

/// 朗读结果
#[derive(Debug, Clone)]
pub struct Narration {
    pub url: String,
    pub characters: u64,
    pub cost: f64,
}

/// 合成并存储一段音频
///
/// 后台 worker 与一次性命令共用
pub struct Narrator {
    speech: Arc<dyn SpeechSynthesizerPort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
    rates: RateTable,
}

impl Narrator {
    pub fn new(
        speech: Arc<dyn SpeechSynthesizerPort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
        rates: RateTable,
    ) -> Self {
        Self {
            speech,
            artifact_store,
            rates,
        }
    }

    pub async fn narrate(&self, key: &str, text: &str, voice: &str, model: &str) -> Result<Narration, ApplicationError> {
        let rate = self
            .rates
            .rate(model)
            .ok_or_else(|| ApplicationError::validation(format!("unknown speech model: {}", model)))?;

        let output = self
            .speech
            .synthesize(SpeechRequest {
                text: text.to_string(),
                voice: voice.to_string(),
                model: model.to_string(),
            })
            .await?;
        let url = self.artifact_store.put(key, &output.audio_data).await?;
        let characters = billable_characters(text);

        tracing::debug!(
            key = %key,
            characters = characters,
            duration_ms = ?output.duration_ms,
            "Audio synthesized"
        );

        Ok(Narration {
            url,
            characters,
            cost: characters as f64 * rate,
        })
    }

    /// 合成单章，正文为空时返回 Validation
    pub async fn narrate_chapter(&self, job: &AudiobookJob, chapter: &Chapter) -> Result<AudioSegment, ApplicationError> {
        let text = chapter
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApplicationError::validation(format!("chapter {} has no text", chapter.number)))?;
        let key = chapter_audio_key(job.book_id, chapter.number);
        let narration = self.narrate(&key, text, &job.voice, &job.model).await?;
        Ok(AudioSegment {
            url: narration.url,
            characters: narration.characters,
            cost: narration.cost,
            completed_at: Utc::now(),
        })
    }
}

/// 章节音频存储路径
pub fn chapter_audio_key(book_id: Uuid, chapter_number: u32) -> String {
    format!("audio/{}/chapter-{}.mp3", book_id, chapter_number)
}

async fn load_book(
    book_repo: &Arc<dyn BookRepositoryPort>,
    ctx: &RequestContext,
    book_id: Uuid,
) -> Result<Book, ApplicationError> {
    let book = book_repo
        .find_by_id(book_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("Book", book_id))?;
    ctx.ensure_can_access(&book)?;
    Ok(book)
}

async fn load_job(
    audiobook_repo: &Arc<dyn AudiobookRepositoryPort>,
    job_id: Uuid,
) -> Result<AudiobookJob, ApplicationError> {
    audiobook_repo
        .find_by_id(job_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("AudiobookJob", job_id))
}

// ============================================================================
// StartAudiobook
// ============================================================================

/// StartAudiobook Handler
///
/// 同音色同模型的最近终态任务会被恢复（保留 progress），否则新建任务
pub struct StartAudiobookHandler {
    settings: AudiobookSettings,
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
    work_queue: Arc<dyn WorkQueuePort>,
    event_publisher: Arc<EventPublisher>,
}

impl StartAudiobookHandler {
    pub fn new(
        settings: AudiobookSettings,
        book_repo: Arc<dyn BookRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
        work_queue: Arc<dyn WorkQueuePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            settings,
            book_repo,
            chapter_repo,
            audiobook_repo,
            work_queue,
            event_publisher,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: StartAudiobook) -> Result<AudiobookJob, ApplicationError> {
        let voice = self.settings.resolve_voice(cmd.voice.as_deref())?;
        let (model, rate) = self.settings.resolve_model(cmd.model.as_deref())?;

        let book = load_book(&self.book_repo, ctx, cmd.book_id).await?;
        if !matches!(book.status, BookStatus::Complete | BookStatus::Published) {
            return Err(ApplicationError::invalid_transition(format!(
                "book {} must be complete before narration (status: {})",
                book.id,
                book.status.as_str()
            )));
        }

        let chapters = self.chapter_repo.find_by_book(book.id).await?;
        let estimate = estimate(&chapters, &model, rate);
        if estimate.chapters.is_empty() {
            return Err(ApplicationError::validation("book has no chapter text to narrate"));
        }

        let latest = self.audiobook_repo.find_latest_for_book(book.id).await?;
        let job = match latest {
            Some(job) if !job.status().is_terminal() => {
                return Err(ApplicationError::conflict(format!(
                    "book {} already has an audiobook job {} ({})",
                    book.id,
                    job.id,
                    job.status().as_str()
                )));
            }
            Some(mut job) if job.voice == voice && job.model == model => {
                let previous = job.status();
                job.resume(estimate.estimated_cost, cmd.force_regenerate)?;
                self.audiobook_repo.save_state(&job, &[previous]).await?;
                tracing::info!(
                    job_id = %job.id,
                    book_id = %book.id,
                    existing_chapters = job.progress.len(),
                    force = cmd.force_regenerate,
                    "Audiobook job resumed"
                );
                job
            }
            _ => {
                let job = AudiobookJob::new(
                    book.id,
                    voice,
                    model,
                    estimate.estimated_cost,
                    cmd.force_regenerate,
                );
                self.audiobook_repo.create(&job).await?;
                tracing::info!(
                    job_id = %job.id,
                    book_id = %book.id,
                    estimated_cost = job.estimated_cost,
                    "Audiobook job created"
                );
                job
            }
        };

        self.event_publisher.publish_audiobook(&job);
        self.work_queue.wake(WorkKind::Audiobook);
        Ok(job)
    }
}

// ============================================================================
// CancelAudiobook
// ============================================================================

/// CancelAudiobook Handler
///
/// 协作式取消：进行中的合成调用不会被打断，worker 在下一章开始前观察到取消
///
/// 只改写状态，不触碰 worker 并发写入的进度字段
pub struct CancelAudiobookHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
    event_publisher: Arc<EventPublisher>,
}

impl CancelAudiobookHandler {
    pub fn new(
        book_repo: Arc<dyn BookRepositoryPort>,
        audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            book_repo,
            audiobook_repo,
            event_publisher,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: CancelAudiobook) -> Result<AudiobookJob, ApplicationError> {
        let job = load_job(&self.audiobook_repo, cmd.job_id).await?;
        load_book(&self.book_repo, ctx, job.book_id).await?;

        let job = self.audiobook_repo.cancel(job.id).await?;

        tracing::info!(job_id = %job.id, book_id = %job.book_id, current_chapter = job.current_chapter, "Audiobook job cancelled");
        self.event_publisher.publish_audiobook(&job);
        Ok(job)
    }
}

// ============================================================================
// RegenerateChapterAudio
// ============================================================================

/// RegenerateChapterAudio Handler
///
/// 仅在任务处于终态时允许，覆盖该章已有音频
pub struct RegenerateChapterAudioHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
    narrator: Arc<Narrator>,
    event_publisher: Arc<EventPublisher>,
}

impl RegenerateChapterAudioHandler {
    pub fn new(
        book_repo: Arc<dyn BookRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
        narrator: Arc<Narrator>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            book_repo,
            chapter_repo,
            audiobook_repo,
            narrator,
            event_publisher,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: RegenerateChapterAudio) -> Result<AudiobookJob, ApplicationError> {
        let job = load_job(&self.audiobook_repo, cmd.job_id).await?;
        load_book(&self.book_repo, ctx, job.book_id).await?;

        let status = job.status();
        if !status.is_terminal() {
            return Err(ApplicationError::invalid_transition(format!(
                "audiobook job {} is still {}",
                job.id,
                status.as_str()
            )));
        }

        let chapter = self
            .chapter_repo
            .find(job.book_id, cmd.chapter_number)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Chapter", format!("{}#{}", job.book_id, cmd.chapter_number)))?;

        let segment = self.narrator.narrate_chapter(&job, &chapter).await?;
        let written = self
            .audiobook_repo
            .record_segment(job.id, chapter.number, &segment, status, job.claim_seq)
            .await?;
        if !written {
            return Err(ApplicationError::invalid_transition(format!(
                "audiobook job {} changed state during regeneration",
                job.id
            )));
        }

        let job = load_job(&self.audiobook_repo, job.id).await?;
        tracing::info!(job_id = %job.id, chapter = chapter.number, cost = segment.cost, "Chapter audio regenerated");
        self.event_publisher.publish_audiobook(&job);
        Ok(job)
    }
}

// ============================================================================
// GenerateAuxiliaryAudio
// ============================================================================

/// GenerateAuxiliaryAudio Handler
pub struct GenerateAuxiliaryAudioHandler {
    settings: AudiobookSettings,
    book_repo: Arc<dyn BookRepositoryPort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
    narrator: Arc<Narrator>,
}

impl GenerateAuxiliaryAudioHandler {
    pub fn new(
        settings: AudiobookSettings,
        book_repo: Arc<dyn BookRepositoryPort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
        narrator: Arc<Narrator>,
    ) -> Self {
        Self {
            settings,
            book_repo,
            chapter_repo,
            audiobook_repo,
            narrator,
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, cmd: GenerateAuxiliaryAudio) -> Result<AuxiliaryAsset, ApplicationError> {
        let voice = self.settings.resolve_voice(cmd.voice.as_deref())?;
        let (model, _) = self.settings.resolve_model(cmd.model.as_deref())?;
        let book = load_book(&self.book_repo, ctx, cmd.book_id).await?;

        let first_chapter = self.chapter_repo.find(book.id, 1).await?;
        let script = cmd
            .kind
            .script(
                &book.title,
                &voice,
                first_chapter.as_ref().and_then(|c| c.text.as_deref()),
                self.settings.sample_characters,
            )
            .ok_or_else(|| ApplicationError::validation("chapter 1 has no text for a retail sample"))?;

        let key = cmd.kind.storage_key(book.id);
        let narration = self.narrator.narrate(&key, &script, &voice, &model).await?;
        let asset = AuxiliaryAsset {
            book_id: book.id,
            kind: cmd.kind,
            voice,
            model,
            url: narration.url,
            characters: narration.characters,
            cost: narration.cost,
            created_at: Utc::now(),
        };
        self.audiobook_repo.save_asset(&asset).await?;

        tracing::info!(book_id = %book.id, kind = cmd.kind.as_str(), characters = asset.characters, "Auxiliary audio generated");
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::domain::audiobook::{AudiobookState, AudiobookStatus, AuxiliaryKind};
    use crate::domain::book::{BookContext, BookTitle, BookType, Niche};
    use crate::infrastructure::adapters::{FakeGeneratorScript, FakeSpeechSynthesizer, FileArtifactStore};
    use crate::infrastructure::memory::{ChannelWorkQueue, WakeReceivers};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteAudiobookRepository, SqliteBookRepository,
        SqliteChapterRepository,
    };
    use tempfile::TempDir;

    struct Fixture {
        settings: AudiobookSettings,
        books: Arc<SqliteBookRepository>,
        chapters: Arc<SqliteChapterRepository>,
        audiobooks: Arc<SqliteAudiobookRepository>,
        narrator: Arc<Narrator>,
        work_queue: Arc<ChannelWorkQueue>,
        _wake: WakeReceivers,
        events: Arc<EventPublisher>,
        _artifacts: TempDir,
    }

    async fn fixture() -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let artifacts = tempfile::tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(artifacts.path(), "/media").await.unwrap());

        let rates = RateTable::new(HashMap::from([
            ("tts-1".to_string(), 0.001),
            ("tts-1-hd".to_string(), 0.002),
        ]));
        let narrator = Arc::new(Narrator::new(
            Arc::new(FakeSpeechSynthesizer::new(FakeGeneratorScript::new())),
            store,
            rates.clone(),
        ));
        let (work_queue, wake) = ChannelWorkQueue::new();

        Fixture {
            settings: AudiobookSettings {
                voices: vec!["alloy".to_string(), "nova".to_string()],
                default_voice: "alloy".to_string(),
                default_model: "tts-1".to_string(),
                rates,
                sample_characters: 40,
            },
            books: Arc::new(SqliteBookRepository::new(pool.clone())),
            chapters: Arc::new(SqliteChapterRepository::new(pool.clone())),
            audiobooks: Arc::new(SqliteAudiobookRepository::new(pool)),
            narrator,
            work_queue: Arc::new(work_queue),
            _wake: wake,
            events: EventPublisher::new().arc(),
            _artifacts: artifacts,
        }
    }

    impl Fixture {
        fn start_handler(&self) -> StartAudiobookHandler {
            StartAudiobookHandler::new(
                self.settings.clone(),
                self.books.clone(),
                self.chapters.clone(),
                self.audiobooks.clone(),
                self.work_queue.clone(),
                self.events.clone(),
            )
        }

        fn cancel_handler(&self) -> CancelAudiobookHandler {
            CancelAudiobookHandler::new(self.books.clone(), self.audiobooks.clone(), self.events.clone())
        }

        fn regenerate_handler(&self) -> RegenerateChapterAudioHandler {
            RegenerateChapterAudioHandler::new(
                self.books.clone(),
                self.chapters.clone(),
                self.audiobooks.clone(),
                self.narrator.clone(),
                self.events.clone(),
            )
        }

        fn auxiliary_handler(&self) -> GenerateAuxiliaryAudioHandler {
            GenerateAuxiliaryAudioHandler::new(
                self.settings.clone(),
                self.books.clone(),
                self.chapters.clone(),
                self.audiobooks.clone(),
                self.narrator.clone(),
            )
        }

        /// 已完成生成、每章都有正文的书籍
        async fn finished_book(&self, chapter_count: u32) -> Book {
            let mut book = Book::new(
                "u1",
                BookTitle::new("Harbour Lights").unwrap(),
                BookType::Novel,
                Niche::Mystery,
                BookContext::default(),
                true,
            )
            .unwrap();
            book.start_generation(chapter_count).unwrap();
            book.finish_generation().unwrap();
            self.books.save(&book).await.unwrap();

            for n in 1..=chapter_count {
                let mut chapter = Chapter::new(book.id, n, format!("Tide {}", n));
                chapter.edit_text(format!("The lighthouse blinked for the {} time tonight.", n));
                self.chapters.upsert(&chapter).await.unwrap();
            }
            book
        }
    }

    fn start(book_id: Uuid) -> StartAudiobook {
        StartAudiobook {
            book_id,
            voice: None,
            model: None,
            force_regenerate: false,
        }
    }

    #[tokio::test]
    async fn test_unknown_voice_and_model_rejected() {
        let fx = fixture().await;
        let book = fx.finished_book(1).await;
        let ctx = RequestContext::member("u1");

        let err = fx
            .start_handler()
            .handle(
                &ctx,
                StartAudiobook {
                    voice: Some("baritone".to_string()),
                    ..start(book.id)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));

        let err = fx
            .start_handler()
            .handle(
                &ctx,
                StartAudiobook {
                    model: Some("studio".to_string()),
                    ..start(book.id)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_draft_book_cannot_be_narrated() {
        let fx = fixture().await;
        let book = Book::new(
            "u1",
            BookTitle::new("Unwritten").unwrap(),
            BookType::Novel,
            Niche::Mystery,
            BookContext::default(),
            true,
        )
        .unwrap();
        fx.books.save(&book).await.unwrap();

        let err = fx
            .start_handler()
            .handle(&RequestContext::member("u1"), start(book.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_start_creates_pending_job_and_rejects_second_start() {
        let fx = fixture().await;
        let book = fx.finished_book(2).await;
        let ctx = RequestContext::member("u1");

        let job = fx.start_handler().handle(&ctx, start(book.id)).await.unwrap();
        assert_eq!(job.status(), AudiobookStatus::Pending);
        assert_eq!(job.voice, "alloy");
        assert!(job.estimated_cost > 0.0);

        let err = fx.start_handler().handle(&ctx, start(book.id)).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_restart_with_same_voice_resumes_progress() {
        let fx = fixture().await;
        let book = fx.finished_book(2).await;
        let ctx = RequestContext::member("u1");

        let job = fx.start_handler().handle(&ctx, start(book.id)).await.unwrap();
        let claimed = fx.audiobooks.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        let chapter = fx.chapters.find(book.id, 1).await.unwrap().unwrap();
        let segment = fx.narrator.narrate_chapter(&claimed, &chapter).await.unwrap();
        assert!(fx
            .audiobooks
            .record_segment(job.id, 1, &segment, AudiobookStatus::Generating, claimed.claim_seq)
            .await
            .unwrap());
        let mut failed = fx.audiobooks.find_by_id(job.id).await.unwrap().unwrap();
        failed.transition(AudiobookState::failed("speech timeout")).unwrap();
        fx.audiobooks
            .save_state(&failed, &[AudiobookStatus::Generating])
            .await
            .unwrap();

        let resumed = fx.start_handler().handle(&ctx, start(book.id)).await.unwrap();
        assert_eq!(resumed.id, job.id);
        assert_eq!(resumed.status(), AudiobookStatus::Pending);
        assert!(resumed.progress.contains_key(&1));
        assert_eq!(resumed.current_chapter, 1);
        assert!(!resumed.needs_synthesis(1));
        assert!(resumed.needs_synthesis(2));

        // 换音色则新建任务
        fx.cancel_handler()
            .handle(&ctx, CancelAudiobook { job_id: job.id })
            .await
            .unwrap();
        let fresh = fx
            .start_handler()
            .handle(
                &ctx,
                StartAudiobook {
                    voice: Some("nova".to_string()),
                    ..start(book.id)
                },
            )
            .await
            .unwrap();
        assert_ne!(fresh.id, job.id);
        assert!(fresh.progress.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_is_rejected_once_terminal() {
        let fx = fixture().await;
        let book = fx.finished_book(1).await;
        let ctx = RequestContext::member("u1");
        let job = fx.start_handler().handle(&ctx, start(book.id)).await.unwrap();

        let cancelled = fx
            .cancel_handler()
            .handle(&ctx, CancelAudiobook { job_id: job.id })
            .await
            .unwrap();
        assert_eq!(cancelled.status(), AudiobookStatus::Cancelled);

        let err = fx
            .cancel_handler()
            .handle(&ctx, CancelAudiobook { job_id: job.id })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_regenerate_requires_terminal_job() {
        let fx = fixture().await;
        let book = fx.finished_book(2).await;
        let ctx = RequestContext::member("u1");
        let job = fx.start_handler().handle(&ctx, start(book.id)).await.unwrap();
        let cmd = RegenerateChapterAudio {
            job_id: job.id,
            chapter_number: 2,
        };

        let err = fx.regenerate_handler().handle(&ctx, cmd.clone()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidTransition(_)));

        fx.cancel_handler()
            .handle(&ctx, CancelAudiobook { job_id: job.id })
            .await
            .unwrap();
        let job = fx.regenerate_handler().handle(&ctx, cmd).await.unwrap();
        assert_eq!(job.status(), AudiobookStatus::Cancelled);
        assert!(job.progress.contains_key(&2));
        assert!(job.actual_cost > 0.0);
    }

    #[tokio::test]
    async fn test_auxiliary_audio_is_stored_per_kind() {
        let fx = fixture().await;
        let book = fx.finished_book(1).await;
        let ctx = RequestContext::member("u1");

        let asset = fx
            .auxiliary_handler()
            .handle(
                &ctx,
                GenerateAuxiliaryAudio {
                    book_id: book.id,
                    kind: AuxiliaryKind::RetailSample,
                    voice: Some("nova".to_string()),
                    model: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(asset.voice, "nova");
        assert!(asset.characters <= 40);
        let stored = fx
            .audiobooks
            .find_asset(book.id, AuxiliaryKind::RetailSample)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.url, asset.url);
    }

    #[tokio::test]
    async fn test_retail_sample_needs_first_chapter_text() {
        let fx = fixture().await;
        let book = fx.finished_book(0).await;

        let err = fx
            .auxiliary_handler()
            .handle(
                &RequestContext::member("u1"),
                GenerateAuxiliaryAudio {
                    book_id: book.id,
                    kind: AuxiliaryKind::RetailSample,
                    voice: None,
                    model: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }
}
