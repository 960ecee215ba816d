//! Infrastructure layer: repository adapters, ledger services, config.

pub mod config;
pub mod ledger;
pub mod repository;

#[cfg(test)]
mod integration_tests;

pub use config::{AppConfig, ConfigError, LedgerConfig};
pub use ledger::{AdjustmentOutcome, Aggregator, LedgerError, LowStockProduct, StockAdjuster};
pub use repository::{
    CatalogRepository, InMemoryCatalogRepository, PostgresCatalogRepository, RepositoryError,
};
