//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：处理所有写操作

mod audiobook_commands;
mod book_commands;
mod chapter_commands;
mod generation_commands;
mod publish_commands;

pub mod handlers;

pub use audiobook_commands::*;
pub use book_commands::*;
pub use chapter_commands::*;
pub use generation_commands::*;
pub use publish_commands::*;
