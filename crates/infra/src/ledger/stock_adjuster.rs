//! Stock adjustment pipeline.
//!
//! ```text
//! StockAdjustment
//!   ↓
//! 1. Validate input (no IO)
//!   ↓
//! 2. Read product (must exist and be active)
//!   ↓
//! 3. Decide transition (pure, `stockroom_inventory::apply`)
//!   ↓
//! 4. Conditional save, expecting the version read in step 2
//!   ↓  Conflict → back to 2 (bounded by `max_conflict_retries`)
//! AdjustmentOutcome
//! ```
//!
//! The decision is re-made from a fresh read on every attempt, so a Decrease that
//! raced with another Decrease is re-checked against the stock that actually won.

use serde::Serialize;
use tracing::{Span, debug, error, info, instrument, warn};

use stockroom_core::{DomainError, Entity, ExpectedVersion, ProductId, Versioned};
use stockroom_inventory::{AdjustmentMode, StockAdjustment, apply};
use stockroom_products::Product;

use crate::config::LedgerConfig;
use crate::repository::{CatalogRepository, RepositoryError};

use super::error::LedgerError;

/// Result of a committed adjustment: the persisted snapshot plus the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustmentOutcome {
    pub product: Product,
    pub previous_stock: i64,
    pub new_stock: i64,
    /// Echo of the request's annotation.
    pub reason: Option<String>,
}

/// Applies one stock mutation to one product with optimistic concurrency.
#[derive(Debug, Clone)]
pub struct StockAdjuster<R> {
    repository: R,
    config: LedgerConfig,
}

impl<R> StockAdjuster<R> {
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, LedgerConfig::default())
    }

    pub fn with_config(repository: R, config: LedgerConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

impl<R> StockAdjuster<R>
where
    R: CatalogRepository,
{
    #[instrument(
        skip(self, adjustment),
        fields(
            product_id = %adjustment.product_id,
            mode = %adjustment.mode,
            quantity = adjustment.quantity,
            attempts = tracing::field::Empty,
        ),
        err
    )]
    pub async fn adjust_stock(
        &self,
        adjustment: StockAdjustment,
    ) -> Result<AdjustmentOutcome, LedgerError> {
        adjustment.validate()?;

        let mut retries = 0u32;
        loop {
            let current = self.load_product(adjustment.product_id).await?;

            let (updated, transition) = match apply(&current, &adjustment) {
                Ok(decided) => decided,
                Err(err) => {
                    if let DomainError::InsufficientStock {
                        available,
                        requested,
                    } = &err
                    {
                        warn!(available, requested, "decrease rejected: insufficient stock");
                    }
                    return Err(err.into());
                }
            };

            debug!(
                previous_stock = transition.previous_stock,
                new_stock = transition.new_stock,
                version = current.version(),
                "decided stock transition"
            );

            match self
                .repository
                .save_product(updated, ExpectedVersion::of(&current))
                .await
            {
                Ok(saved) => {
                    Span::current().record("attempts", retries + 1);
                    info!(
                        previous_stock = transition.previous_stock,
                        new_stock = transition.new_stock,
                        version = saved.version(),
                        "stock adjusted"
                    );
                    return Ok(AdjustmentOutcome {
                        product: saved,
                        previous_stock: transition.previous_stock,
                        new_stock: transition.new_stock,
                        reason: adjustment.reason.clone(),
                    });
                }
                Err(RepositoryError::Conflict(msg)) => {
                    if retries >= self.config.max_conflict_retries {
                        Span::current().record("attempts", retries + 1);
                        error!(retries, "giving up after repeated version conflicts");
                        return Err(LedgerError::Conflict(format!(
                            "product {} still contended after {} retries: {msg}",
                            adjustment.product_id, retries
                        )));
                    }
                    retries += 1;
                    warn!(retry = retries, "version conflict, re-reading product");
                    tokio::task::yield_now().await;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Resolve `sku` to an active product and adjust it.
    #[instrument(skip(self, reason), err)]
    pub async fn adjust_stock_by_sku(
        &self,
        sku: &str,
        quantity: i64,
        mode: AdjustmentMode,
        reason: Option<String>,
    ) -> Result<AdjustmentOutcome, LedgerError> {
        let product = self
            .repository
            .get_product_by_sku(sku)
            .await?
            .filter(|p| p.is_active())
            .ok_or_else(|| LedgerError::NotFound(format!("product with sku '{}'", sku.trim())))?;

        let mut adjustment = StockAdjustment::new(product.id_typed(), quantity, mode);
        adjustment.reason = reason;
        self.adjust_stock(adjustment).await
    }

    async fn load_product(&self, id: ProductId) -> Result<Product, LedgerError> {
        self.repository
            .get_product_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("product {id}")))
    }
}
