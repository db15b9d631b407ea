//! Command Handlers 实现
//!
//! 所有 CommandHandler 的具体实现

mod audiobook_handlers;
mod book_handlers;
mod chapter_handlers;
mod generation_handlers;
mod publish_handlers;

pub use audiobook_handlers::*;
pub use book_handlers::*;
pub use chapter_handlers::*;
pub use generation_handlers::*;
pub use publish_handlers::*;
