//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（Repository、生成服务、产物存储、额度、打包）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - context: 调用者上下文
//! - error: 应用层错误定义

pub mod commands;
pub mod context;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    handlers::{
        artifact_key, chapter_audio_key, chapter_image_key, cover_image_key, generated_cover_key,
        normalize_image_extension, AudiobookSettings, CancelAudiobookHandler, CreateBookHandler, EditChapterHandler, GenerateAuxiliaryAudioHandler,
        GenerationSettings, Narration, Narrator, PauseJobHandler, PublishBookHandler, PublishResult,
        RegenerateChapterAudioHandler, RequeueJobHandler, StartAudiobookHandler,
        StartGenerationHandler, UpdateBookSettingsHandler, UploadChapterImageHandler,
        UploadCoverImageHandler,
    },
    CancelAudiobook, CreateBook, EditChapter, GenerateAuxiliaryAudio, PauseJob, PublishBook,
    RegenerateChapterAudio, RequeueJob, StartAudiobook, StartGeneration, UpdateBookSettings,
    UploadChapterImage, UploadCoverImage,
};

pub use context::{RequestContext, UserRole};
pub use error::ApplicationError;

pub use ports::{
    ArtifactPackagerPort, ArtifactStoreError, ArtifactStorePort, AudiobookRepositoryPort,
    BookRepositoryPort, BookSettingsUpdate, ChapterRepositoryPort, CreditError, CreditGatePort,
    GenerationError, GenerationJobRepositoryPort, ImageGeneratorPort, ImageOutput, Manuscript,
    ManuscriptChapter, PackagingError, RepositoryError, SpeechOutput, SpeechRequest,
    SpeechSynthesizerPort, TextGeneratorPort, TextOutput, UsageRepositoryPort, WorkKind,
    WorkQueuePort,
};

pub use queries::{
    handlers::{
        AudiobookStatusView, AuxiliaryAudioFile, EstimateAudiobookHandler,
        GenerationProgress, GetAudiobookStatusHandler, GetAuxiliaryAudioHandler, GetBookHandler,
        GetGenerationProgressHandler, GetPublishStatusHandler, ListBooksHandler, ListJobsHandler,
    },
    EstimateAudiobook, GetAudiobookStatus, GetAuxiliaryAudio, GetBook, GetGenerationProgress,
    GetPublishStatus, ListBooks, ListJobs,
};
