//! One-shot read-side reports, printed as JSON.
//!
//! This is the polling primitive an external notifier shells out to, e.g.
//! `stockroom-reporter low-stock 5` every few minutes.

use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockroom_core::StoreId;
use stockroom_infra::{Aggregator, CatalogRepository, LedgerConfig, LedgerError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("failed to encode report: {0}")]
    Encode(String),
}

/// Inventory reports over the stockroom catalog.
#[derive(Debug, Parser)]
#[command(name = "stockroom-reporter", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Active products at or below the threshold, across all stores.
    LowStock {
        /// Defaults to STOCKROOM_LOW_STOCK_THRESHOLD.
        #[arg(allow_negative_numbers = true)]
        threshold: Option<i64>,
    },
    /// Inventory value and per-category breakdown of one store.
    Stats {
        store_id: StoreId,
        #[arg(allow_negative_numbers = true)]
        threshold: Option<i64>,
    },
    /// Stock and price totals of one store.
    Revenue { store_id: StoreId },
    /// Create the tables the reports read from.
    InitSchema,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    LowStock { threshold: Option<i64> },
    Stats { store_id: StoreId, threshold: Option<i64> },
    Revenue { store_id: StoreId },
}

impl Command {
    /// The read-only report this command runs, if any.
    pub fn report(&self) -> Option<Report> {
        match *self {
            Command::LowStock { threshold } => Some(Report::LowStock { threshold }),
            Command::Stats {
                store_id,
                threshold,
            } => Some(Report::Stats {
                store_id,
                threshold,
            }),
            Command::Revenue { store_id } => Some(Report::Revenue { store_id }),
            Command::InitSchema => None,
        }
    }
}

/// Run one report against `repository`.
pub async fn run_report<R>(
    report: Report,
    repository: R,
    config: LedgerConfig,
) -> Result<JsonValue, ReportError>
where
    R: CatalogRepository,
{
    let aggregator = Aggregator::with_config(repository, config);
    let encoded = match report {
        Report::LowStock { threshold } => {
            serde_json::to_value(aggregator.find_low_stock(threshold).await?)
        }
        Report::Stats {
            store_id,
            threshold,
        } => serde_json::to_value(aggregator.get_store_stats(store_id, threshold).await?),
        Report::Revenue { store_id } => {
            serde_json::to_value(aggregator.get_store_revenue(store_id).await?)
        }
    };
    encoded.map_err(|e| ReportError::Encode(e.to_string()))
}
