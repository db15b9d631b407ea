//! Audiobook Commands

use uuid::Uuid;

use crate::domain::audiobook::AuxiliaryKind;

/// 开始（或恢复）有声书生成
#[derive(Debug, Clone)]
pub struct StartAudiobook {
    pub book_id: Uuid,
    pub voice: Option<String>,
    pub model: Option<String>,
    pub force_regenerate: bool,
}

/// 取消有声书生成
#[derive(Debug, Clone)]
pub struct CancelAudiobook {
    pub job_id: Uuid,
}

/// 重新合成单章音频
#[derive(Debug, Clone)]
pub struct RegenerateChapterAudio {
    pub job_id: Uuid,
    pub chapter_number: u32,
}

/// 生成附加音频
#[derive(Debug, Clone)]
pub struct GenerateAuxiliaryAudio {
    pub book_id: Uuid,
    pub kind: AuxiliaryKind,
    pub voice: Option<String>,
    pub model: Option<String>,
}
