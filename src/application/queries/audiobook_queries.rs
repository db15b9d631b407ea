//! Audiobook Queries

use uuid::Uuid;

use crate::domain::audiobook::AuxiliaryKind;

/// 费用估算（无副作用）
#[derive(Debug, Clone)]
pub struct EstimateAudiobook {
    pub book_id: Uuid,
    pub model: Option<String>,
}

/// 获取书籍最近的有声书任务
#[derive(Debug, Clone)]
pub struct GetAudiobookStatus {
    pub book_id: Uuid,
}

/// 获取附加音频文件
#[derive(Debug, Clone)]
pub struct GetAuxiliaryAudio {
    pub book_id: Uuid,
    pub kind: AuxiliaryKind,
}
