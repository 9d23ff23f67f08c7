use bigdecimal::BigDecimal;
use std::fmt;

use crate::domain::NewOrderLine;

pub const NOTES_MAX_LEN: usize = 1000;
pub const MAX_ITEMS_PER_TRANSACTION: usize = 100;
pub const MAX_LINE_QUANTITY: i32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_notes(notes: &str) -> ValidationResult {
    if notes.len() > NOTES_MAX_LEN {
        return Err(ValidationError::new(
            "notes",
            format!("must be at most {} characters", NOTES_MAX_LEN),
        ));
    }

    Ok(())
}

pub fn validate_non_negative(field: &'static str, value: &BigDecimal) -> ValidationResult {
    if value < &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must not be negative"));
    }

    Ok(())
}

/// Item-list validation applied on create and on a pending-state item
/// replacement: non-empty list, positive quantities, non-negative prices and
/// discounts, and a per-line discount that does not exceed the line gross
/// when both figures are supplied.
pub fn validate_items(items: &[NewOrderLine]) -> ValidationResult {
    if items.is_empty() {
        return Err(ValidationError::new("items", "must not be empty"));
    }

    if items.len() > MAX_ITEMS_PER_TRANSACTION {
        return Err(ValidationError::new(
            "items",
            format!("must have at most {} lines", MAX_ITEMS_PER_TRANSACTION),
        ));
    }

    for line in items {
        if line.quantity <= 0 {
            return Err(ValidationError::new(
                "items.quantity",
                "must be greater than zero",
            ));
        }

        if line.quantity > MAX_LINE_QUANTITY {
            return Err(ValidationError::new(
                "items.quantity",
                format!("must be at most {}", MAX_LINE_QUANTITY),
            ));
        }

        if let Some(price) = &line.unit_price {
            validate_non_negative("items.unit_price", price)?;
        }

        if let Some(discount) = &line.discount_amount {
            validate_non_negative("items.discount_amount", discount)?;

            if let Some(price) = &line.unit_price {
                let gross = price.clone() * BigDecimal::from(line.quantity);
                if discount > &gross {
                    return Err(ValidationError::new(
                        "items.discount_amount",
                        "must not exceed the line total",
                    ));
                }
            }
        }
    }

    Ok(())
}
