//! Collaborator contracts consumed by the lifecycle engine.
//!
//! The conditional status transition on [`TransactionStore`] is the single
//! synchronization point of the whole system: every actor that wants to move
//! a transaction out of a state must go through it, and a lost race surfaces
//! as `None` rather than a double-applied write.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{OrderLine, PaymentStatus, Transaction, TransactionStatus};
use crate::error::AppError;

/// Catalog view of a product at resolution time.
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub unit_price: BigDecimal,
    pub stock_quantity: i32,
}

/// Product stock collaborator. Adjustments are atomic per product; nothing
/// here is atomic across a transaction's item list.
#[async_trait]
pub trait ProductStock: Send + Sync {
    /// Resolve a product snapshot. Fails `NotFound` for an unknown id.
    async fn get(&self, id: Uuid) -> Result<ProductSnapshot, AppError>;

    /// Apply a signed stock delta and return the new quantity. Rejects with
    /// `InsufficientStock` when the result would go negative.
    async fn adjust_stock(&self, id: Uuid, delta: i32) -> Result<i32, AppError>;

    /// Deduct up to `qty` units, clamping at zero, and return how many units
    /// were actually removed. Used only by the recovery sweep's
    /// force-completion path.
    async fn deduct_up_to(&self, id: Uuid, qty: i32) -> Result<i32, AppError>;
}

/// Durable transaction storage with compare-and-set status transitions.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> Result<Transaction, AppError>;

    /// Lookup by id. Fails `NotFound` when the record is missing.
    async fn get(&self, id: Uuid) -> Result<Transaction, AppError>;

    /// Persist a full pending-state record. Returns `None` when no pending
    /// row with this id matched, i.e. the record is missing or has already
    /// left `pending`.
    async fn update_pending(&self, tx: &Transaction) -> Result<Option<Transaction>, AppError>;

    /// The compare-and-set primitive: set `status = to` (with the given
    /// payment status and item list) only where `status = from`. Returns the
    /// updated record, or `None` when the guard did not match — the caller
    /// lost the race and must unwind any stock change it already applied.
    async fn transition_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        payment_status: PaymentStatus,
        items: &[OrderLine],
    ) -> Result<Option<Transaction>, AppError>;

    /// All pending transactions created before `cutoff`, oldest first.
    async fn list_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError>;

    /// Every pending transaction, oldest first.
    async fn list_pending(&self) -> Result<Vec<Transaction>, AppError>;

    /// Delete the record only while it is pending. Returns whether a row was
    /// removed.
    async fn delete_pending(&self, id: Uuid) -> Result<bool, AppError>;

    /// Unconditional delete. Administrative force path only.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}
