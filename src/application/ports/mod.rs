//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_store;
mod credit_gate;
mod generators;
mod packager;
mod repositories;
mod work_queue;

pub use artifact_store::{ArtifactStoreError, ArtifactStorePort};
pub use credit_gate::{CreditError, CreditGatePort};
pub use generators::{
    GenerationError, ImageGeneratorPort, ImageOutput, SpeechOutput, SpeechRequest,
    SpeechSynthesizerPort, TextGeneratorPort, TextOutput,
};
pub use packager::{ArtifactPackagerPort, Manuscript, ManuscriptChapter, PackagingError};
pub use repositories::{
    AudiobookRepositoryPort, BookRepositoryPort, BookSettingsUpdate, ChapterRepositoryPort,
    GenerationJobRepositoryPort, RepositoryError, UsageRepositoryPort,
};
pub use work_queue::{WorkKind, WorkQueuePort};
