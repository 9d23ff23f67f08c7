//! Transaction domain entity.
//! Framework-agnostic representation of a retail sale and its order lines.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sale lifecycle state. `Voided` exists for administrative overrides only;
/// the lifecycle manager never transitions into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
    Voided,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            "voided" => Ok(TransactionStatus::Voided),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    Voucher,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Mobile => "mobile",
            PaymentMethod::Voucher => "voucher",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "mobile" => Ok(PaymentMethod::Mobile),
            "voucher" => Ok(PaymentMethod::Voucher),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// One sale line. `product_name` and `unit_price` are snapshots taken at
/// creation time, so history survives later catalog edits.
///
/// `applied_qty` records how many units have actually been deducted from
/// stock for this line: 0 while the sale is pending, set during completion,
/// zeroed again when a cancellation restores stock. Stock compensation always
/// works from this field, never from `quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub discount_amount: BigDecimal,
    pub total_price: BigDecimal,
    #[serde(default)]
    pub applied_qty: i32,
}

impl OrderLine {
    pub fn new(
        product_id: Uuid,
        product_name: String,
        quantity: i32,
        unit_price: BigDecimal,
        discount_amount: BigDecimal,
    ) -> Self {
        let gross = unit_price.clone() * BigDecimal::from(quantity);
        let total_price = gross - discount_amount.clone();
        Self {
            product_id,
            product_name,
            quantity,
            unit_price,
            discount_amount,
            total_price,
            applied_qty: 0,
        }
    }
}

/// Domain entity representing a sale transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub items: Vec<OrderLine>,
    pub subtotal: BigDecimal,
    pub discount_amount: BigDecimal,
    pub tax_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: TransactionStatus,
    pub cashier_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a new pending transaction from resolved order lines.
    /// Totals follow the invariant `total = subtotal - discount - tax`, where
    /// the discount aggregates the order-level discount and all line discounts.
    pub fn new(input: &CreateTransaction, items: Vec<OrderLine>) -> Self {
        let now = Utc::now();
        let (subtotal, discount_amount, tax_amount, total_amount) =
            compute_totals(&items, input.discount_amount.clone(), input.tax_amount.clone());
        Self {
            id: Uuid::new_v4(),
            store_id: input.store_id,
            customer_id: input.customer_id,
            items,
            subtotal,
            discount_amount,
            tax_amount,
            total_amount,
            payment_method: input.payment_method,
            payment_status: PaymentStatus::Pending,
            status: TransactionStatus::Pending,
            cashier_id: input.cashier_id,
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// `subtotal = Σ(quantity * unit_price)` over the lines; line discounts are
/// folded into `discount_amount` together with the order-level discount.
pub fn compute_totals(
    items: &[OrderLine],
    order_discount: Option<BigDecimal>,
    tax: Option<BigDecimal>,
) -> (BigDecimal, BigDecimal, BigDecimal, BigDecimal) {
    let zero = BigDecimal::from(0);
    let subtotal = items
        .iter()
        .map(|line| line.unit_price.clone() * BigDecimal::from(line.quantity))
        .fold(zero.clone(), |acc, x| acc + x);
    let line_discounts = items
        .iter()
        .map(|line| line.discount_amount.clone())
        .fold(zero.clone(), |acc, x| acc + x);
    let discount_amount = order_discount.unwrap_or_else(|| zero.clone()) + line_discounts;
    let tax_amount = tax.unwrap_or(zero);
    let total_amount = subtotal.clone() - discount_amount.clone() - tax_amount.clone();
    (subtotal, discount_amount, tax_amount, total_amount)
}

/// Input for creating a transaction. Prices are optional per line; a missing
/// price falls back to the catalog snapshot at resolution time.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub store_id: Uuid,
    pub cashier_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewOrderLine>,
    pub discount_amount: Option<BigDecimal>,
    pub tax_amount: Option<BigDecimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<BigDecimal>,
    pub discount_amount: Option<BigDecimal>,
}

/// Pending-state patch. Absent fields are left untouched; replacing `items`
/// re-resolves snapshots and recomputes every total.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTransaction {
    pub customer_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub discount_amount: Option<BigDecimal>,
    pub tax_amount: Option<BigDecimal>,
    pub items: Option<Vec<NewOrderLine>>,
}
