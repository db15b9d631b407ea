//! Publish Commands

use uuid::Uuid;

use crate::domain::book::PublishFormat;

/// 发布命令
#[derive(Debug, Clone)]
pub struct PublishBook {
    pub book_id: Uuid,
    pub formats: Vec<PublishFormat>,
    /// 忽略就绪检查
    pub force: bool,
}
