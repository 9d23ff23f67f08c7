//! Lifecycle engine integration tests over the in-memory adapters.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use tillpoint_core::adapters::{MemoryProductStock, MemoryTransactionStore};
use tillpoint_core::domain::{
    CreateTransaction, NewOrderLine, PaymentMethod, PaymentStatus, TransactionStatus,
    UpdateTransaction,
};
use tillpoint_core::error::AppError;
use tillpoint_core::ports::{ProductStock, TransactionStore};
use tillpoint_core::services::TransactionLifecycle;

struct Harness {
    store: Arc<MemoryTransactionStore>,
    products: Arc<MemoryProductStock>,
    lifecycle: TransactionLifecycle,
    soap: Uuid,
    tea: Uuid,
}

/// Two seeded products: soap at 10 with 8 in stock, tea at 5 with 4 in stock.
fn harness() -> Harness {
    let store = Arc::new(MemoryTransactionStore::new());
    let products = Arc::new(MemoryProductStock::new());

    let soap = Uuid::new_v4();
    let tea = Uuid::new_v4();
    products.seed_product(soap, "Soap", BigDecimal::from(10), 8);
    products.seed_product(tea, "Tea", BigDecimal::from(5), 4);

    let lifecycle = TransactionLifecycle::new(store.clone(), products.clone());
    Harness {
        store,
        products,
        lifecycle,
        soap,
        tea,
    }
}

fn two_line_input(h: &Harness) -> CreateTransaction {
    CreateTransaction {
        store_id: Uuid::new_v4(),
        cashier_id: Uuid::new_v4(),
        customer_id: None,
        payment_method: PaymentMethod::Cash,
        items: vec![
            NewOrderLine {
                product_id: h.soap,
                quantity: 3,
                unit_price: Some(BigDecimal::from(10)),
                discount_amount: None,
            },
            NewOrderLine {
                product_id: h.tea,
                quantity: 1,
                unit_price: Some(BigDecimal::from(5)),
                discount_amount: None,
            },
        ],
        discount_amount: None,
        tax_amount: None,
        notes: None,
    }
}

#[tokio::test]
async fn create_computes_totals_and_leaves_stock_alone() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    assert_eq!(tx.subtotal, BigDecimal::from(35));
    assert_eq!(tx.total_amount, BigDecimal::from(35));
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.payment_status, PaymentStatus::Pending);
    assert!(tx.items.iter().all(|line| line.applied_qty == 0));

    // creation never reserves or checks stock
    assert_eq!(h.products.stock_of(h.soap), Some(8));
    assert_eq!(h.products.stock_of(h.tea), Some(4));
}

#[tokio::test]
async fn create_snapshots_product_names() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    assert_eq!(tx.items[0].product_name, "Soap");
    assert_eq!(tx.items[1].product_name, "Tea");
}

#[tokio::test]
async fn create_falls_back_to_catalog_price() {
    let h = harness();
    let mut input = two_line_input(&h);
    input.items[0].unit_price = None;

    let tx = h.lifecycle.create(input).await.unwrap();
    assert_eq!(tx.items[0].unit_price, BigDecimal::from(10));
}

#[tokio::test]
async fn create_rejects_unknown_product() {
    let h = harness();
    let mut input = two_line_input(&h);
    input.items[0].product_id = Uuid::new_v4();

    assert!(matches!(
        h.lifecycle.create(input).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn create_rejects_empty_and_invalid_items() {
    let h = harness();
    let mut input = two_line_input(&h);
    input.items.clear();
    assert!(matches!(
        h.lifecycle.create(input).await,
        Err(AppError::Validation(_))
    ));

    let mut input = two_line_input(&h);
    input.items[0].quantity = 0;
    assert!(matches!(
        h.lifecycle.create(input).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn complete_decrements_stock_once_per_line() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    let completed = h.lifecycle.complete(tx.id).await.unwrap();
    assert_eq!(completed.status, TransactionStatus::Completed);
    assert_eq!(completed.payment_status, PaymentStatus::Completed);
    assert_eq!(completed.items[0].applied_qty, 3);
    assert_eq!(completed.items[1].applied_qty, 1);

    assert_eq!(h.products.stock_of(h.soap), Some(5));
    assert_eq!(h.products.stock_of(h.tea), Some(3));
}

#[tokio::test]
async fn complete_is_all_or_nothing_on_insufficient_stock() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    // drain tea before completion
    h.products.deduct_up_to(h.tea, 4).await.unwrap();

    let err = h.lifecycle.complete(tx.id).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock(_)));

    // no partial decrement on the other line, transaction still pending
    assert_eq!(h.products.stock_of(h.soap), Some(8));
    let reloaded = h.store.get(tx.id).await.unwrap();
    assert_eq!(reloaded.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn completing_twice_never_double_decrements() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    h.lifecycle.complete(tx.id).await.unwrap();
    let second = h.lifecycle.complete(tx.id).await.unwrap_err();
    assert!(matches!(
        second,
        AppError::InvalidState(_) | AppError::Conflict(_)
    ));

    assert_eq!(h.products.stock_of(h.soap), Some(5));
    assert_eq!(h.products.stock_of(h.tea), Some(3));
}

#[tokio::test]
async fn complete_then_cancel_round_trips_stock() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    h.lifecycle.complete(tx.id).await.unwrap();
    let cancelled = h.lifecycle.cancel(tx.id).await.unwrap();

    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    assert!(cancelled.items.iter().all(|line| line.applied_qty == 0));

    // back to pre-completion levels
    assert_eq!(h.products.stock_of(h.soap), Some(8));
    assert_eq!(h.products.stock_of(h.tea), Some(4));
}

#[tokio::test]
async fn cancel_pending_touches_no_stock() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    let cancelled = h.lifecycle.cancel(tx.id).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    assert_eq!(h.products.stock_of(h.soap), Some(8));
    assert_eq!(h.products.stock_of(h.tea), Some(4));
}

#[tokio::test]
async fn cancelling_twice_never_restores_twice() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    h.lifecycle.complete(tx.id).await.unwrap();
    h.lifecycle.cancel(tx.id).await.unwrap();

    let second = h.lifecycle.cancel(tx.id).await.unwrap_err();
    assert!(matches!(second, AppError::InvalidState(_)));

    assert_eq!(h.products.stock_of(h.soap), Some(8));
    assert_eq!(h.products.stock_of(h.tea), Some(4));
}

#[tokio::test]
async fn update_recomputes_totals_when_items_change() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    let patch = UpdateTransaction {
        items: Some(vec![NewOrderLine {
            product_id: h.tea,
            quantity: 4,
            unit_price: Some(BigDecimal::from(5)),
            discount_amount: Some(BigDecimal::from(2)),
        }]),
        ..Default::default()
    };

    let updated = h.lifecycle.update(tx.id, patch).await.unwrap();
    assert_eq!(updated.subtotal, BigDecimal::from(20));
    assert_eq!(updated.discount_amount, BigDecimal::from(2));
    assert_eq!(updated.total_amount, BigDecimal::from(18));
    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.items[0].product_name, "Tea");
}

#[tokio::test]
async fn update_patches_scalar_fields_without_touching_items() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    let customer = Uuid::new_v4();
    let patch = UpdateTransaction {
        customer_id: Some(customer),
        payment_method: Some(PaymentMethod::Card),
        notes: Some("  hold  at  register  ".to_string()),
        ..Default::default()
    };

    let updated = h.lifecycle.update(tx.id, patch).await.unwrap();
    assert_eq!(updated.customer_id, Some(customer));
    assert_eq!(updated.payment_method, PaymentMethod::Card);
    assert_eq!(updated.notes.as_deref(), Some("hold at register"));
    assert_eq!(updated.subtotal, BigDecimal::from(35));
}

#[tokio::test]
async fn update_rejects_non_pending_transaction() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();
    h.lifecycle.complete(tx.id).await.unwrap();

    let err = h
        .lifecycle
        .update(tx.id, UpdateTransaction::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn delete_only_removes_pending_without_force() {
    let h = harness();
    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();

    h.lifecycle.delete(tx.id, false).await.unwrap();
    assert!(matches!(
        h.store.get(tx.id).await,
        Err(AppError::NotFound(_))
    ));

    let tx = h.lifecycle.create(two_line_input(&h)).await.unwrap();
    h.lifecycle.complete(tx.id).await.unwrap();

    let err = h.lifecycle.delete(tx.id, false).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    // the force override removes history but never compensates stock
    h.lifecycle.delete(tx.id, true).await.unwrap();
    assert!(matches!(
        h.store.get(tx.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(h.products.stock_of(h.soap), Some(5));
}

#[tokio::test]
async fn delete_unknown_transaction_is_not_found() {
    let h = harness();
    assert!(matches!(
        h.lifecycle.delete(Uuid::new_v4(), false).await,
        Err(AppError::NotFound(_))
    ));
}
