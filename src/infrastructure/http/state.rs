//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    AudiobookSettings, CancelAudiobookHandler, CreateBookHandler, EditChapterHandler,
    GenerateAuxiliaryAudioHandler, GenerationSettings, Narrator, PauseJobHandler,
    PublishBookHandler, RegenerateChapterAudioHandler, RequeueJobHandler, StartAudiobookHandler,
    StartGenerationHandler, UpdateBookSettingsHandler, UploadChapterImageHandler,
    UploadCoverImageHandler,
    // Query handlers
    EstimateAudiobookHandler, GetAudiobookStatusHandler, GetAuxiliaryAudioHandler,
    GetBookHandler, GetGenerationProgressHandler, GetPublishStatusHandler, ListBooksHandler,
    ListJobsHandler,
    // Ports
    ArtifactPackagerPort, ArtifactStorePort, AudiobookRepositoryPort, BookRepositoryPort,
    ChapterRepositoryPort, CreditGatePort, GenerationJobRepositoryPort, UsageRepositoryPort,
    WorkQueuePort,
};
use crate::infrastructure::events::EventPublisher;

/// 装配 handler 所需的端口实现
#[derive(Clone)]
pub struct AppPorts {
    pub book_repo: Arc<dyn BookRepositoryPort>,
    pub job_repo: Arc<dyn GenerationJobRepositoryPort>,
    pub chapter_repo: Arc<dyn ChapterRepositoryPort>,
    pub usage_repo: Arc<dyn UsageRepositoryPort>,
    pub audiobook_repo: Arc<dyn AudiobookRepositoryPort>,
    pub artifact_store: Arc<dyn ArtifactStorePort>,
    pub packager: Arc<dyn ArtifactPackagerPort>,
    pub credit_gate: Arc<dyn CreditGatePort>,
    pub work_queue: Arc<dyn WorkQueuePort>,
    pub narrator: Arc<Narrator>,
    pub event_publisher: Arc<EventPublisher>,
}

/// 应用状态
pub struct AppState {
    pub event_publisher: Arc<EventPublisher>,

    // ========== Command Handlers ==========
    pub create_book_handler: CreateBookHandler,
    pub update_book_settings_handler: UpdateBookSettingsHandler,
    pub upload_cover_image_handler: UploadCoverImageHandler,
    pub start_generation_handler: StartGenerationHandler,
    pub requeue_job_handler: RequeueJobHandler,
    pub pause_job_handler: PauseJobHandler,
    pub edit_chapter_handler: EditChapterHandler,
    pub upload_chapter_image_handler: UploadChapterImageHandler,
    pub publish_book_handler: PublishBookHandler,
    pub start_audiobook_handler: StartAudiobookHandler,
    pub cancel_audiobook_handler: CancelAudiobookHandler,
    pub regenerate_chapter_audio_handler: RegenerateChapterAudioHandler,
    pub generate_auxiliary_audio_handler: GenerateAuxiliaryAudioHandler,

    // ========== Query Handlers ==========
    pub get_book_handler: GetBookHandler,
    pub list_books_handler: ListBooksHandler,
    pub get_generation_progress_handler: GetGenerationProgressHandler,
    pub list_jobs_handler: ListJobsHandler,
    pub get_publish_status_handler: GetPublishStatusHandler,
    pub estimate_audiobook_handler: EstimateAudiobookHandler,
    pub get_audiobook_status_handler: GetAudiobookStatusHandler,
    pub get_auxiliary_audio_handler: GetAuxiliaryAudioHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        ports: AppPorts,
        generation: GenerationSettings,
        audiobook: AudiobookSettings,
    ) -> Self {
        let AppPorts {
            book_repo,
            job_repo,
            chapter_repo,
            usage_repo,
            audiobook_repo,
            artifact_store,
            packager,
            credit_gate,
            work_queue,
            narrator,
            event_publisher,
        } = ports;

        Self {
            event_publisher: event_publisher.clone(),

            // Command handlers
            create_book_handler: CreateBookHandler::new(book_repo.clone()),
            update_book_settings_handler: UpdateBookSettingsHandler::new(book_repo.clone()),
            upload_cover_image_handler: UploadCoverImageHandler::new(
                book_repo.clone(),
                artifact_store.clone(),
            ),
            start_generation_handler: StartGenerationHandler::new(
                generation,
                book_repo.clone(),
                job_repo.clone(),
                chapter_repo.clone(),
                usage_repo.clone(),
                credit_gate,
                work_queue.clone(),
                event_publisher.clone(),
            ),
            requeue_job_handler: RequeueJobHandler::new(
                book_repo.clone(),
                job_repo.clone(),
                work_queue.clone(),
                event_publisher.clone(),
            ),
            pause_job_handler: PauseJobHandler::new(job_repo.clone(), event_publisher.clone()),
            edit_chapter_handler: EditChapterHandler::new(book_repo.clone(), chapter_repo.clone()),
            upload_chapter_image_handler: UploadChapterImageHandler::new(
                book_repo.clone(),
                chapter_repo.clone(),
                artifact_store.clone(),
            ),
            publish_book_handler: PublishBookHandler::new(
                book_repo.clone(),
                chapter_repo.clone(),
                packager,
                artifact_store.clone(),
                event_publisher.clone(),
            ),
            start_audiobook_handler: StartAudiobookHandler::new(
                audiobook.clone(),
                book_repo.clone(),
                chapter_repo.clone(),
                audiobook_repo.clone(),
                work_queue,
                event_publisher.clone(),
            ),
            cancel_audiobook_handler: CancelAudiobookHandler::new(
                book_repo.clone(),
                audiobook_repo.clone(),
                event_publisher.clone(),
            ),
            regenerate_chapter_audio_handler: RegenerateChapterAudioHandler::new(
                book_repo.clone(),
                chapter_repo.clone(),
                audiobook_repo.clone(),
                narrator.clone(),
                event_publisher.clone(),
            ),
            generate_auxiliary_audio_handler: GenerateAuxiliaryAudioHandler::new(
                audiobook.clone(),
                book_repo.clone(),
                chapter_repo.clone(),
                audiobook_repo.clone(),
                narrator,
            ),

            // Query handlers
            get_book_handler: GetBookHandler::new(book_repo.clone()),
            list_books_handler: ListBooksHandler::new(book_repo.clone()),
            get_generation_progress_handler: GetGenerationProgressHandler::new(
                book_repo.clone(),
                job_repo.clone(),
                chapter_repo.clone(),
                usage_repo,
            ),
            list_jobs_handler: ListJobsHandler::new(job_repo),
            get_publish_status_handler: GetPublishStatusHandler::new(
                book_repo.clone(),
                chapter_repo.clone(),
            ),
            estimate_audiobook_handler: EstimateAudiobookHandler::new(
                audiobook,
                book_repo.clone(),
                chapter_repo,
            ),
            get_audiobook_status_handler: GetAudiobookStatusHandler::new(
                book_repo.clone(),
                audiobook_repo.clone(),
            ),
            get_auxiliary_audio_handler: GetAuxiliaryAudioHandler::new(
                book_repo,
                audiobook_repo,
                artifact_store,
            ),
        }
    }
}
