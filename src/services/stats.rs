//! Read-only aggregation over the pending set, shared by the scheduler's
//! status endpoint and the inspection CLI.

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::ports::TransactionStore;

#[derive(Debug, Clone, Serialize)]
pub struct PendingStats {
    pub total: usize,
    pub older_than_1h: usize,
    pub older_than_3h: usize,
    pub oldest: Option<OldestPending>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OldestPending {
    pub id: Uuid,
    pub total_amount: BigDecimal,
    pub age_minutes: i64,
}

/// Stateless; every call reads the store fresh.
#[derive(Clone)]
pub struct StatsReporter {
    store: Arc<dyn TransactionStore>,
}

impl StatsReporter {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    pub async fn pending_stats(&self) -> Result<PendingStats, AppError> {
        let pending = self.store.list_pending().await?;
        let now = Utc::now();
        let hour_ago = now - Duration::hours(1);
        let three_hours_ago = now - Duration::hours(3);

        let older_than_1h = pending.iter().filter(|tx| tx.created_at < hour_ago).count();
        let older_than_3h = pending
            .iter()
            .filter(|tx| tx.created_at < three_hours_ago)
            .count();

        // list_pending is oldest-first
        let oldest = pending.first().map(|tx| OldestPending {
            id: tx.id,
            total_amount: tx.total_amount.clone(),
            age_minutes: (now - tx.created_at).num_minutes(),
        });

        Ok(PendingStats {
            total: pending.len(),
            older_than_1h,
            older_than_3h,
            oldest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransactionStore;
    use crate::domain::{CreateTransaction, OrderLine, PaymentMethod, Transaction};
    use crate::ports::TransactionStore as _;

    fn pending_transaction(total: i64) -> Transaction {
        let input = CreateTransaction {
            store_id: Uuid::new_v4(),
            cashier_id: Uuid::new_v4(),
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            items: vec![],
            discount_amount: None,
            tax_amount: None,
            notes: None,
        };
        let items = vec![OrderLine::new(
            Uuid::new_v4(),
            "Tea".to_string(),
            1,
            BigDecimal::from(total),
            BigDecimal::from(0),
        )];
        Transaction::new(&input, items)
    }

    #[tokio::test]
    async fn empty_store_yields_zeroed_stats() {
        let store = Arc::new(MemoryTransactionStore::new());
        let reporter = StatsReporter::new(store);

        let stats = reporter.pending_stats().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.older_than_1h, 0);
        assert!(stats.oldest.is_none());
    }

    #[tokio::test]
    async fn buckets_pending_by_age_and_reports_oldest() {
        let store = Arc::new(MemoryTransactionStore::new());

        let fresh = pending_transaction(10);
        store.insert(&fresh).await.unwrap();

        let stale = pending_transaction(42);
        store.insert(&stale).await.unwrap();
        store.backdate(stale.id, Utc::now() - Duration::hours(4));

        let aging = pending_transaction(7);
        store.insert(&aging).await.unwrap();
        store.backdate(aging.id, Utc::now() - Duration::minutes(90));

        let reporter = StatsReporter::new(store);
        let stats = reporter.pending_stats().await.unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.older_than_1h, 2);
        assert_eq!(stats.older_than_3h, 1);

        let oldest = stats.oldest.expect("oldest pending");
        assert_eq!(oldest.id, stale.id);
        assert_eq!(oldest.total_amount, BigDecimal::from(42));
        assert!(oldest.age_minutes >= 239);
    }
}
