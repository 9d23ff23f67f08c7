//! Postgres implementation of TransactionStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{OrderLine, PaymentStatus, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::TransactionStore;

/// Postgres-backed transaction store. The status column is plain text; the
/// compare-and-set transition relies on the `AND status = $from` guard in a
/// single UPDATE, never on a prior read.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn insert(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, store_id, customer_id, items, subtotal, discount_amount,
                tax_amount, total_amount, payment_method, payment_status,
                status, cashier_id, notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.store_id)
        .bind(tx.customer_id)
        .bind(Json(&tx.items))
        .bind(&tx.subtotal)
        .bind(&tx.discount_amount)
        .bind(&tx.tax_amount)
        .bind(&tx.total_amount)
        .bind(tx.payment_method.as_str())
        .bind(tx.payment_status.as_str())
        .bind(tx.status.as_str())
        .bind(tx.cashier_id)
        .bind(&tx.notes)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get(&self, id: Uuid) -> Result<Transaction, AppError> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => r.into_domain(),
            None => Err(AppError::NotFound(format!("Transaction {} not found", id))),
        }
    }

    async fn update_pending(&self, tx: &Transaction) -> Result<Option<Transaction>, AppError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions SET
                customer_id = $2, items = $3, subtotal = $4, discount_amount = $5,
                tax_amount = $6, total_amount = $7, payment_method = $8,
                notes = $9, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.customer_id)
        .bind(Json(&tx.items))
        .bind(&tx.subtotal)
        .bind(&tx.discount_amount)
        .bind(&tx.tax_amount)
        .bind(&tx.total_amount)
        .bind(tx.payment_method.as_str())
        .bind(&tx.notes)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        payment_status: PaymentStatus,
        items: &[OrderLine],
    ) -> Result<Option<Transaction>, AppError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = $2, payment_status = $3, items = $4, updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(payment_status.as_str())
        .bind(Json(items))
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn list_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn list_pending(&self) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn delete_pending(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    store_id: Uuid,
    customer_id: Option<Uuid>,
    items: Json<Vec<OrderLine>>,
    subtotal: bigdecimal::BigDecimal,
    discount_amount: bigdecimal::BigDecimal,
    tax_amount: bigdecimal::BigDecimal,
    total_amount: bigdecimal::BigDecimal,
    payment_method: String,
    payment_status: String,
    status: String,
    cashier_id: Uuid,
    notes: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> Result<Transaction, AppError> {
        Ok(Transaction {
            id: self.id,
            store_id: self.store_id,
            customer_id: self.customer_id,
            items: self.items.0,
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
            payment_method: self.payment_method.parse().map_err(AppError::Internal)?,
            payment_status: self.payment_status.parse().map_err(AppError::Internal)?,
            status: self.status.parse().map_err(AppError::Internal)?,
            cashier_id: self.cashier_id,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
