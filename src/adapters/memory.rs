//! In-memory implementations of the ports, used by the test suite.
//!
//! Each method takes the lock once and performs its whole read-modify-write
//! under it, so the compare-and-set semantics match the Postgres adapters.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{OrderLine, PaymentStatus, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::{ProductSnapshot, ProductStock, TransactionStore};

#[derive(Debug, Clone)]
struct ProductRecord {
    name: String,
    unit_price: BigDecimal,
    stock_quantity: i32,
}

#[derive(Default)]
pub struct MemoryProductStock {
    products: Mutex<HashMap<Uuid, ProductRecord>>,
}

impl MemoryProductStock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_product(&self, id: Uuid, name: &str, unit_price: BigDecimal, stock: i32) {
        let mut products = self.products.lock().unwrap();
        products.insert(
            id,
            ProductRecord {
                name: name.to_string(),
                unit_price,
                stock_quantity: stock,
            },
        );
    }

    pub fn stock_of(&self, id: Uuid) -> Option<i32> {
        let products = self.products.lock().unwrap();
        products.get(&id).map(|p| p.stock_quantity)
    }
}

#[async_trait]
impl ProductStock for MemoryProductStock {
    async fn get(&self, id: Uuid) -> Result<ProductSnapshot, AppError> {
        let products = self.products.lock().unwrap();
        products
            .get(&id)
            .map(|p| ProductSnapshot {
                id,
                name: p.name.clone(),
                unit_price: p.unit_price.clone(),
                stock_quantity: p.stock_quantity,
            })
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }

    async fn adjust_stock(&self, id: Uuid, delta: i32) -> Result<i32, AppError> {
        let mut products = self.products.lock().unwrap();
        let product = products
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))?;

        let next = product.stock_quantity + delta;
        if next < 0 {
            return Err(AppError::InsufficientStock(format!(
                "Product {} cannot absorb adjustment of {}",
                id, delta
            )));
        }

        product.stock_quantity = next;
        Ok(next)
    }

    async fn deduct_up_to(&self, id: Uuid, qty: i32) -> Result<i32, AppError> {
        let mut products = self.products.lock().unwrap();
        let product = products
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))?;

        let applied = qty.min(product.stock_quantity).max(0);
        product.stock_quantity -= applied;
        Ok(applied)
    }
}

#[derive(Default)]
pub struct MemoryTransactionStore {
    transactions: Mutex<HashMap<Uuid, Transaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a record's creation time. Test helper for exercising the
    /// age-based sweep predicate.
    pub fn backdate(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut transactions = self.transactions.lock().unwrap();
        if let Some(tx) = transactions.get_mut(&id) {
            tx.created_at = created_at;
        }
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn insert(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        let mut transactions = self.transactions.lock().unwrap();
        transactions.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Transaction, AppError> {
        let transactions = self.transactions.lock().unwrap();
        transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))
    }

    async fn update_pending(&self, tx: &Transaction) -> Result<Option<Transaction>, AppError> {
        let mut transactions = self.transactions.lock().unwrap();
        match transactions.get_mut(&tx.id) {
            Some(existing) if existing.status == TransactionStatus::Pending => {
                let mut updated = tx.clone();
                updated.status = existing.status;
                updated.payment_status = existing.payment_status;
                updated.created_at = existing.created_at;
                updated.updated_at = Utc::now();
                *existing = updated.clone();
                Ok(Some(updated))
            }
            _ => Ok(None),
        }
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        payment_status: PaymentStatus,
        items: &[OrderLine],
    ) -> Result<Option<Transaction>, AppError> {
        let mut transactions = self.transactions.lock().unwrap();
        match transactions.get_mut(&id) {
            Some(existing) if existing.status == from => {
                existing.status = to;
                existing.payment_status = payment_status;
                existing.items = items.to_vec();
                existing.updated_at = Utc::now();
                Ok(Some(existing.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError> {
        let transactions = self.transactions.lock().unwrap();
        let mut pending: Vec<Transaction> = transactions
            .values()
            .filter(|tx| tx.status == TransactionStatus::Pending && tx.created_at < cutoff)
            .cloned()
            .collect();
        pending.sort_by_key(|tx| tx.created_at);
        Ok(pending)
    }

    async fn list_pending(&self) -> Result<Vec<Transaction>, AppError> {
        let transactions = self.transactions.lock().unwrap();
        let mut pending: Vec<Transaction> = transactions
            .values()
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|tx| tx.created_at);
        Ok(pending)
    }

    async fn delete_pending(&self, id: Uuid) -> Result<bool, AppError> {
        let mut transactions = self.transactions.lock().unwrap();
        match transactions.get(&id) {
            Some(tx) if tx.status == TransactionStatus::Pending => {
                transactions.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut transactions = self.transactions.lock().unwrap();
        Ok(transactions.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateTransaction, PaymentMethod};

    fn pending_transaction() -> Transaction {
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
            "Soap".to_string(),
            2,
            BigDecimal::from(3),
            BigDecimal::from(0),
        )];
        Transaction::new(&input, items)
    }

    #[tokio::test]
    async fn adjust_stock_rejects_underflow() {
        let stock = MemoryProductStock::new();
        let id = Uuid::new_v4();
        stock.seed_product(id, "Soap", BigDecimal::from(3), 2);

        assert!(matches!(
            stock.adjust_stock(id, -3).await,
            Err(AppError::InsufficientStock(_))
        ));
        assert_eq!(stock.stock_of(id), Some(2));
        assert_eq!(stock.adjust_stock(id, -2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deduct_up_to_clamps_at_zero() {
        let stock = MemoryProductStock::new();
        let id = Uuid::new_v4();
        stock.seed_product(id, "Soap", BigDecimal::from(3), 2);

        assert_eq!(stock.deduct_up_to(id, 5).await.unwrap(), 2);
        assert_eq!(stock.stock_of(id), Some(0));
        assert_eq!(stock.deduct_up_to(id, 5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transition_requires_expected_prior_status() {
        let store = MemoryTransactionStore::new();
        let tx = pending_transaction();
        store.insert(&tx).await.unwrap();

        let first = store
            .transition_status(
                tx.id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                PaymentStatus::Completed,
                &tx.items,
            )
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .transition_status(
                tx.id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                PaymentStatus::Completed,
                &tx.items,
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn update_pending_skips_non_pending_records() {
        let store = MemoryTransactionStore::new();
        let tx = pending_transaction();
        store.insert(&tx).await.unwrap();
        store
            .transition_status(
                tx.id,
                TransactionStatus::Pending,
                TransactionStatus::Cancelled,
                PaymentStatus::Refunded,
                &tx.items,
            )
            .await
            .unwrap();

        assert!(store.update_pending(&tx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_pending_leaves_history_alone() {
        let store = MemoryTransactionStore::new();
        let tx = pending_transaction();
        store.insert(&tx).await.unwrap();
        store
            .transition_status(
                tx.id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                PaymentStatus::Completed,
                &tx.items,
            )
            .await
            .unwrap();

        assert!(!store.delete_pending(tx.id).await.unwrap());
        assert!(store.get(tx.id).await.is_ok());
        assert!(store.delete(tx.id).await.unwrap());
    }
}
