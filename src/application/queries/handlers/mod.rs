//! Query Handlers 实现
//!
//! 所有 QueryHandler 的具体实现

mod audiobook_handlers;
mod book_handlers;
mod progress_handlers;

pub use audiobook_handlers::*;
pub use book_handlers::*;
pub use progress_handlers::*;
