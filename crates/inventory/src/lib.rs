//! Inventory ledger domain module.
//!
//! This crate contains the stock-adjustment rules and the read-side aggregate
//! folds, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage). The infra layer wires them to a repository.

pub mod adjustment;
pub mod valuation;

pub use adjustment::{AdjustmentMode, StockAdjustment, Transition, apply, decide};
pub use valuation::{
    CategoryBreakdown, DEFAULT_LOW_STOCK_THRESHOLD, StoreRevenue, StoreStats, low_stock,
    validate_threshold,
};
