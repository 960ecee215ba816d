//! Ledger services: the stock adjuster (write path) and the aggregator (read path).
//!
//! Both are generic over [`CatalogRepository`](crate::repository::CatalogRepository)
//! and contain no IO of their own.

pub mod aggregator;
pub mod error;
pub mod stock_adjuster;

pub use aggregator::{Aggregator, LowStockProduct};
pub use error::LedgerError;
pub use stock_adjuster::{AdjustmentOutcome, StockAdjuster};
