//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：处理所有读操作

mod audiobook_queries;
mod book_queries;
mod progress_queries;

pub mod handlers;

pub use audiobook_queries::*;
pub use book_queries::*;
pub use progress_queries::*;
