//! HTTP Handlers

mod audiobook;
mod book;
mod chapter;
mod generation;
mod ping;
mod publish;
mod websocket;

pub use audiobook::*;
pub use book::{create_book, get_book, list_books, update_book_settings, upload_cover};
pub use chapter::*;
pub use generation::*;
pub use ping::*;
pub use publish::*;
pub use websocket::*;
