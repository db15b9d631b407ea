//! SQLite Persistence - SQLite 数据库持久化实现

mod audiobook_repo;
mod book_repo;
mod chapter_repo;
mod database;
mod generation_job_repo;
mod usage_repo;

pub use audiobook_repo::*;
pub use book_repo::*;
pub use chapter_repo::*;
pub use database::*;
pub use generation_job_repo::*;
pub use usage_repo::*;
