pub mod transaction;

pub use transaction::{
    CreateTransaction, NewOrderLine, OrderLine, PaymentMethod, PaymentStatus, Transaction,
    TransactionStatus, UpdateTransaction, compute_totals,
};
