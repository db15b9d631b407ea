//! Memory Layer - In-Memory State Management
//!
//! 额度账本与 worker 唤醒通道

mod credit_ledger;
mod work_queue;

pub use credit_ledger::InMemoryCreditLedger;
pub use work_queue::{ChannelWorkQueue, WakeReceivers};
