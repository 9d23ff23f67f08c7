//! Postgres implementation of the product stock collaborator.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::ports::{ProductSnapshot, ProductStock};

/// Stock adjustments are single guarded UPDATEs, so each call is atomic per
/// product row. The guard `stock_quantity + delta >= 0` rejects underflow
/// instead of clamping, matching the all-or-nothing completion check.
#[derive(Clone)]
pub struct PostgresProductStock {
    pool: PgPool,
}

impl PostgresProductStock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }
}

#[async_trait]
impl ProductStock for PostgresProductStock {
    async fn get(&self, id: Uuid) -> Result<ProductSnapshot, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, unit_price, stock_quantity FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(ProductSnapshot {
                id: r.id,
                name: r.name,
                unit_price: r.unit_price,
                stock_quantity: r.stock_quantity,
            }),
            None => Err(AppError::NotFound(format!("Product {} not found", id))),
        }
    }

    async fn adjust_stock(&self, id: Uuid, delta: i32) -> Result<i32, AppError> {
        let new_quantity: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity + $2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match new_quantity {
            Some(q) => Ok(q),
            None => {
                if self.exists(id).await? {
                    Err(AppError::InsufficientStock(format!(
                        "Product {} cannot absorb adjustment of {}",
                        id, delta
                    )))
                } else {
                    Err(AppError::NotFound(format!("Product {} not found", id)))
                }
            }
        }
    }

    async fn deduct_up_to(&self, id: Uuid, qty: i32) -> Result<i32, AppError> {
        let applied: Option<i32> = sqlx::query_scalar(
            r#"
            WITH prev AS (
                SELECT stock_quantity FROM products WHERE id = $1 FOR UPDATE
            )
            UPDATE products
            SET stock_quantity = GREATEST(products.stock_quantity - $2, 0), updated_at = NOW()
            FROM prev
            WHERE products.id = $1
            RETURNING prev.stock_quantity - products.stock_quantity
            "#,
        )
        .bind(id)
        .bind(qty)
        .fetch_optional(&self.pool)
        .await?;

        applied.ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    unit_price: bigdecimal::BigDecimal,
    stock_quantity: i32,
}
