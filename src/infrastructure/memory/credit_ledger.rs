//! In-Memory Credit Ledger Implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{CreditError, CreditGatePort};

/// 内存额度账本
///
/// 新用户首次访问时以 `default_allowance` 开户；关闭时所有预留都成功
pub struct InMemoryCreditLedger {
    enabled: bool,
    default_allowance: u32,
    /// user_id -> 剩余额度
    balances: DashMap<String, u32>,
}

impl InMemoryCreditLedger {
    pub fn new(enabled: bool, default_allowance: u32) -> Self {
        Self {
            enabled,
            default_allowance,
            balances: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 管理员调整额度
    pub fn grant(&self, user_id: &str, amount: u32) {
        let mut balance = self
            .balances
            .entry(user_id.to_string())
            .or_insert(self.default_allowance);
        *balance = balance.saturating_add(amount);
        tracing::info!(user_id = %user_id, amount, balance = *balance, "Credits granted");
    }
}

#[async_trait]
impl CreditGatePort for InMemoryCreditLedger {
    async fn reserve(&self, user_id: &str, cost: u32) -> Result<(), CreditError> {
        if !self.enabled {
            return Ok(());
        }

        // entry 持有分片写锁，检查与扣减是原子的
        let mut balance = self
            .balances
            .entry(user_id.to_string())
            .or_insert(self.default_allowance);
        if *balance < cost {
            tracing::warn!(user_id = %user_id, required = cost, available = *balance, "Insufficient credits");
            return Err(CreditError::Insufficient {
                user_id: user_id.to_string(),
                required: cost,
                available: *balance,
            });
        }
        *balance -= cost;
        tracing::debug!(user_id = %user_id, cost, remaining = *balance, "Credits reserved");
        Ok(())
    }

    async fn release(&self, user_id: &str, cost: u32) -> Result<(), CreditError> {
        if !self.enabled {
            return Ok(());
        }
        let mut balance = self
            .balances
            .entry(user_id.to_string())
            .or_insert(self.default_allowance);
        *balance = balance.saturating_add(cost);
        tracing::debug!(user_id = %user_id, cost, remaining = *balance, "Credits released");
        Ok(())
    }

    async fn balance(&self, user_id: &str) -> Result<u32, CreditError> {
        if !self.enabled {
            return Ok(u32::MAX);
        }
        Ok(self
            .balances
            .get(user_id)
            .map(|b| *b)
            .unwrap_or(self.default_allowance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_until_exhausted() {
        let ledger = InMemoryCreditLedger::new(true, 2);
        ledger.reserve("u1", 1).await.unwrap();
        ledger.reserve("u1", 1).await.unwrap();

        let err = ledger.reserve("u1", 1).await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::Insufficient { required: 1, available: 0, .. }
        ));

        ledger.release("u1", 1).await.unwrap();
        assert_eq!(ledger.balance("u1").await.unwrap(), 1);
        assert_eq!(ledger.balance("u2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_disabled_ledger_always_succeeds() {
        let ledger = InMemoryCreditLedger::new(false, 0);
        for _ in 0..5 {
            ledger.reserve("u1", 1).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_grant_adds_to_balance() {
        let ledger = InMemoryCreditLedger::new(true, 0);
        assert!(ledger.reserve("u1", 1).await.is_err());
        ledger.grant("u1", 3);
        ledger.reserve("u1", 1).await.unwrap();
        assert_eq!(ledger.balance("u1").await.unwrap(), 2);
    }
}
