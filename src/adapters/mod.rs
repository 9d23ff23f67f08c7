pub mod memory;
pub mod postgres_product_stock;
pub mod postgres_transaction_store;

pub use memory::{MemoryProductStock, MemoryTransactionStore};
pub use postgres_product_stock::PostgresProductStock;
pub use postgres_transaction_store::PostgresTransactionStore;
