//! Transaction lifecycle manager.
//!
//! Owns every transition of the sale state machine and the stock adjustments
//! that ride along with them. The only synchronization point is the store's
//! conditional status transition: stock is adjusted first, the transition is
//! attempted second, and the loser of a concurrent race unwinds its own
//! adjustments. A plain read of the status is never treated as permission to
//! proceed.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    compute_totals, CreateTransaction, NewOrderLine, OrderLine, PaymentStatus, Transaction,
    TransactionStatus, UpdateTransaction,
};
use crate::error::AppError;
use crate::ports::{ProductStock, TransactionStore};
use crate::validation;

pub struct TransactionLifecycle {
    store: Arc<dyn TransactionStore>,
    products: Arc<dyn ProductStock>,
}

impl TransactionLifecycle {
    pub fn new(store: Arc<dyn TransactionStore>, products: Arc<dyn ProductStock>) -> Self {
        Self { store, products }
    }

    /// Create a pending sale. Product names (and prices, where the caller
    /// left them out) are snapshotted from the catalog; stock is neither
    /// checked nor reserved, since a pending sale may be abandoned.
    pub async fn create(&self, input: CreateTransaction) -> Result<Transaction, AppError> {
        validation::validate_items(&input.items)?;
        if let Some(discount) = &input.discount_amount {
            validation::validate_non_negative("discount_amount", discount)?;
        }
        if let Some(tax) = &input.tax_amount {
            validation::validate_non_negative("tax_amount", tax)?;
        }

        let mut input = input;
        if let Some(notes) = input.notes.take() {
            let notes = validation::sanitize_string(&notes);
            validation::validate_notes(&notes)?;
            input.notes = (!notes.is_empty()).then_some(notes);
        }

        let lines = self.resolve_lines(&input.items).await?;
        let tx = Transaction::new(&input, lines);
        let inserted = self.store.insert(&tx).await?;

        info!(
            "Created transaction {} with {} line(s), total {}",
            inserted.id,
            inserted.items.len(),
            inserted.total_amount
        );

        Ok(inserted)
    }

    /// Complete a pending sale, decrementing stock exactly once per line.
    ///
    /// The sufficiency check runs over every line before any stock moves, so
    /// a failure leaves no partial decrement. After the decrements, the
    /// conditional `pending -> completed` transition decides the race; losing
    /// it means another actor already completed or cancelled this sale, and
    /// every decrement applied here is reversed before returning `Conflict`.
    pub async fn complete(&self, id: Uuid) -> Result<Transaction, AppError> {
        let tx = self.store.get(id).await?;
        if tx.status != TransactionStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Transaction {} is {}, not pending",
                id, tx.status
            )));
        }

        for line in &tx.items {
            let snapshot = self.products.get(line.product_id).await?;
            if line.quantity > snapshot.stock_quantity {
                return Err(AppError::InsufficientStock(format!(
                    "Product {} has {} unit(s), {} requested",
                    line.product_id, snapshot.stock_quantity, line.quantity
                )));
            }
        }

        let mut items = tx.items.clone();
        for idx in 0..items.len() {
            let (product_id, quantity) = (items[idx].product_id, items[idx].quantity);
            match self.products.adjust_stock(product_id, -quantity).await {
                Ok(_) => items[idx].applied_qty = quantity,
                Err(err) => {
                    // A line failed after earlier lines already landed, e.g. a
                    // concurrent sale drained the stock between check and
                    // decrement. Roll the applied lines back and surface it.
                    self.restore_applied(&mut items).await;
                    return Err(err);
                }
            }
        }

        match self
            .store
            .transition_status(
                id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                PaymentStatus::Completed,
                &items,
            )
            .await?
        {
            Some(updated) => {
                info!("Completed transaction {} ({} line(s))", id, updated.items.len());
                Ok(updated)
            }
            None => {
                self.restore_applied(&mut items).await;
                Err(AppError::Conflict(format!(
                    "Transaction {} was modified concurrently",
                    id
                )))
            }
        }
    }

    /// Sweep-only completion: deducts whatever stock remains (clamped at
    /// zero) instead of failing on insufficiency, so abandoned sales are
    /// reconciled even when the shelf has since emptied. The shortfall is
    /// logged and the per-line `applied_qty` records what actually moved.
    pub async fn force_complete(&self, id: Uuid) -> Result<Transaction, AppError> {
        let tx = self.store.get(id).await?;
        if tx.status != TransactionStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Transaction {} is {}, not pending",
                id, tx.status
            )));
        }

        let mut items = tx.items.clone();
        for idx in 0..items.len() {
            let (product_id, quantity) = (items[idx].product_id, items[idx].quantity);
            match self.products.deduct_up_to(product_id, quantity).await {
                Ok(applied) => {
                    items[idx].applied_qty = applied;
                    if applied < quantity {
                        warn!(
                            "Force-completing transaction {}: product {} short by {} unit(s)",
                            id,
                            product_id,
                            quantity - applied
                        );
                    }
                }
                Err(err) => {
                    self.restore_applied(&mut items).await;
                    return Err(err);
                }
            }
        }

        match self
            .store
            .transition_status(
                id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                PaymentStatus::Completed,
                &items,
            )
            .await?
        {
            Some(updated) => {
                info!("Force-completed stale transaction {}", id);
                Ok(updated)
            }
            None => {
                self.restore_applied(&mut items).await;
                Err(AppError::Conflict(format!(
                    "Transaction {} was modified concurrently",
                    id
                )))
            }
        }
    }

    /// Cancel a pending or completed sale. Cancelling a completed sale
    /// restores exactly the stock that was applied at completion; cancelling
    /// a pending one touches no stock at all. A sale that already reached a
    /// terminal state is rejected, never restored twice.
    pub async fn cancel(&self, id: Uuid) -> Result<Transaction, AppError> {
        let tx = self.store.get(id).await?;
        match tx.status {
            TransactionStatus::Pending => {
                match self
                    .store
                    .transition_status(
                        id,
                        TransactionStatus::Pending,
                        TransactionStatus::Cancelled,
                        PaymentStatus::Refunded,
                        &tx.items,
                    )
                    .await?
                {
                    Some(updated) => {
                        info!("Cancelled pending transaction {}", id);
                        Ok(updated)
                    }
                    None => Err(AppError::Conflict(format!(
                        "Transaction {} was modified concurrently",
                        id
                    ))),
                }
            }
            TransactionStatus::Completed => {
                let mut items = tx.items.clone();
                let mut restored: Vec<(Uuid, i32)> = Vec::new();
                for line in items.iter_mut() {
                    if line.applied_qty <= 0 {
                        continue;
                    }
                    match self
                        .products
                        .adjust_stock(line.product_id, line.applied_qty)
                        .await
                    {
                        Ok(_) => {
                            restored.push((line.product_id, line.applied_qty));
                            line.applied_qty = 0;
                        }
                        Err(err) => {
                            self.undo_restores(&restored).await;
                            return Err(err);
                        }
                    }
                }

                match self
                    .store
                    .transition_status(
                        id,
                        TransactionStatus::Completed,
                        TransactionStatus::Cancelled,
                        PaymentStatus::Refunded,
                        &items,
                    )
                    .await?
                {
                    Some(updated) => {
                        info!("Cancelled completed transaction {}, stock restored", id);
                        Ok(updated)
                    }
                    None => {
                        self.undo_restores(&restored).await;
                        Err(AppError::Conflict(format!(
                            "Transaction {} was modified concurrently",
                            id
                        )))
                    }
                }
            }
            TransactionStatus::Cancelled | TransactionStatus::Voided => {
                Err(AppError::InvalidState(format!(
                    "Transaction {} is already {}",
                    id, tx.status
                )))
            }
        }
    }

    /// Patch a pending sale. Replacing the item list re-resolves product
    /// snapshots and recomputes totals exactly as creation does. The write is
    /// conditional on the record still being pending.
    pub async fn update(&self, id: Uuid, patch: UpdateTransaction) -> Result<Transaction, AppError> {
        let mut tx = self.store.get(id).await?;
        if tx.status != TransactionStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Transaction {} is {}, not pending",
                id, tx.status
            )));
        }

        // Order-level discount is stored folded with the line discounts, so
        // recover it before the item list may change underneath it.
        let old_line_discounts = tx
            .items
            .iter()
            .map(|line| line.discount_amount.clone())
            .fold(BigDecimal::from(0), |acc, x| acc + x);
        let mut order_discount = tx.discount_amount.clone() - old_line_discounts;
        let mut tax = tx.tax_amount.clone();

        if let Some(customer_id) = patch.customer_id {
            tx.customer_id = Some(customer_id);
        }
        if let Some(method) = patch.payment_method {
            tx.payment_method = method;
        }
        if let Some(notes) = patch.notes {
            let notes = validation::sanitize_string(&notes);
            validation::validate_notes(&notes)?;
            tx.notes = (!notes.is_empty()).then_some(notes);
        }
        if let Some(discount) = patch.discount_amount {
            validation::validate_non_negative("discount_amount", &discount)?;
            order_discount = discount;
        }
        if let Some(patch_tax) = patch.tax_amount {
            validation::validate_non_negative("tax_amount", &patch_tax)?;
            tax = patch_tax;
        }
        if let Some(new_items) = patch.items {
            validation::validate_items(&new_items)?;
            tx.items = self.resolve_lines(&new_items).await?;
        }

        let (subtotal, discount_amount, tax_amount, total_amount) =
            compute_totals(&tx.items, Some(order_discount), Some(tax));
        tx.subtotal = subtotal;
        tx.discount_amount = discount_amount;
        tx.tax_amount = tax_amount;
        tx.total_amount = total_amount;

        match self.store.update_pending(&tx).await? {
            Some(updated) => {
                info!("Updated pending transaction {}", id);
                Ok(updated)
            }
            None => Err(AppError::InvalidState(format!(
                "Transaction {} left pending before the update landed",
                id
            ))),
        }
    }

    /// Delete a pending sale (nothing to compensate). With `force`, also
    /// hard-deletes completed or cancelled history; that path drops records
    /// without touching stock and exists for administrative cleanup only.
    pub async fn delete(&self, id: Uuid, force: bool) -> Result<(), AppError> {
        if self.store.delete_pending(id).await? {
            info!("Deleted pending transaction {}", id);
            return Ok(());
        }

        let tx = self.store.get(id).await?;
        if !force {
            return Err(AppError::InvalidState(format!(
                "Transaction {} is {}; only pending transactions can be deleted",
                id, tx.status
            )));
        }

        warn!(
            "Force-deleting {} transaction {} (history removed, stock untouched)",
            tx.status, id
        );
        self.store.delete(id).await?;
        Ok(())
    }

    async fn resolve_lines(&self, items: &[NewOrderLine]) -> Result<Vec<OrderLine>, AppError> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let snapshot = self.products.get(item.product_id).await?;
            let unit_price = item
                .unit_price
                .clone()
                .unwrap_or_else(|| snapshot.unit_price.clone());
            let discount = item
                .discount_amount
                .clone()
                .unwrap_or_else(|| BigDecimal::from(0));
            lines.push(OrderLine::new(
                item.product_id,
                snapshot.name,
                item.quantity,
                unit_price,
                discount,
            ));
        }
        Ok(lines)
    }

    /// Reverse the decrements recorded in `applied_qty`, zeroing the field as
    /// each restoration lands. A restoration that itself fails is logged and
    /// skipped; the remaining lines are still attempted.
    async fn restore_applied(&self, items: &mut [OrderLine]) {
        for line in items.iter_mut().filter(|l| l.applied_qty > 0) {
            match self
                .products
                .adjust_stock(line.product_id, line.applied_qty)
                .await
            {
                Ok(_) => line.applied_qty = 0,
                Err(err) => warn!(
                    "Failed to restore {} unit(s) of product {} during unwind: {}",
                    line.applied_qty, line.product_id, err
                ),
            }
        }
    }

    /// Take back restorations after a lost cancel race. Uses the clamped
    /// deduction so the unwind always makes progress even if a concurrent
    /// sale consumed part of the restored stock; any drift is logged.
    async fn undo_restores(&self, restored: &[(Uuid, i32)]) {
        for (product_id, qty) in restored {
            match self.products.deduct_up_to(*product_id, *qty).await {
                Ok(applied) if applied < *qty => warn!(
                    "Stock for product {} drifted during cancel unwind ({} of {} reclaimed)",
                    product_id, applied, qty
                ),
                Ok(_) => {}
                Err(err) => warn!(
                    "Failed to unwind stock restoration for product {}: {}",
                    product_id, err
                ),
            }
        }
    }
}
