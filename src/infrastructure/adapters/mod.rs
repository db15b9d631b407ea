//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod generation;
pub mod packaging;
pub mod speech;
pub mod storage;

pub use generation::*;
pub use packaging::*;
pub use speech::*;
pub use storage::*;
