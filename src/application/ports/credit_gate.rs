//! Credit Gate Port - 额度闸门
//!
//! 受额度限制的用户在创建生成任务前预留额度

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("Insufficient credits for {user_id}: required {required}, available {available}")]
    Insufficient {
        user_id: String,
        required: u32,
        available: u32,
    },

    #[error("Credit service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CreditGatePort: Send + Sync {
    /// 预留额度，不足时返回 `Insufficient`
    async fn reserve(&self, user_id: &str, cost: u32) -> Result<(), CreditError>;

    /// 归还预留（后续步骤失败时）
    async fn release(&self, user_id: &str, cost: u32) -> Result<(), CreditError>;

    async fn balance(&self, user_id: &str) -> Result<u32, CreditError>;
}
