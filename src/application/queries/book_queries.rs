//! Book Queries

use uuid::Uuid;

/// 获取书籍详情
#[derive(Debug, Clone)]
pub struct GetBook {
    pub book_id: Uuid,
}

/// 列出书籍（管理员可见全部）
#[derive(Debug, Clone)]
pub struct ListBooks;
