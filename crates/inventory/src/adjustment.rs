//! Stock adjustment rules.
//!
//! An adjustment is a stateless transformation of a product's current stock
//! into a new stock value. Deciding the transition is pure; persisting it is
//! the caller's job (a single conditional write in the infra layer).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ProductId};
use stockroom_products::Product;

/// How `quantity` is applied to the current stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    /// `new = previous + quantity`.
    Increase,
    /// `new = previous - quantity`; rejected in full if it would go negative.
    Decrease,
    /// `new = quantity` (correction / stock-take path).
    SetAbsolute,
}

impl AdjustmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentMode::Increase => "increase",
            AdjustmentMode::Decrease => "decrease",
            AdjustmentMode::SetAbsolute => "set_absolute",
        }
    }
}

impl core::fmt::Display for AdjustmentMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "increase" | "add" => Ok(AdjustmentMode::Increase),
            "decrease" | "subtract" => Ok(AdjustmentMode::Decrease),
            "set" | "set_absolute" => Ok(AdjustmentMode::SetAbsolute),
            other => Err(DomainError::validation(format!(
                "unknown adjustment mode '{other}' (expected increase, decrease or set)"
            ))),
        }
    }
}

/// Request to adjust one product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: i64,
    pub mode: AdjustmentMode,
    /// Free-text annotation; echoed back, never persisted, no effect on the result.
    pub reason: Option<String>,
}

impl StockAdjustment {
    pub fn new(product_id: ProductId, quantity: i64, mode: AdjustmentMode) -> Self {
        Self {
            product_id,
            quantity,
            mode,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Input checks that do not need the product.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::validation(format!(
                "quantity must be a non-negative integer (got {})",
                self.quantity
            )));
        }
        Ok(())
    }
}

/// Before/after stock values of a decided adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// Decide the stock transition for `adjustment` against the current `product`.
///
/// This must not mutate anything; on error the product is, by construction,
/// left as it was.
pub fn decide(product: &Product, adjustment: &StockAdjustment) -> DomainResult<Transition> {
    adjustment.validate()?;

    if product.id_typed() != adjustment.product_id {
        return Err(DomainError::invariant("product_id mismatch"));
    }
    if !product.is_active() {
        return Err(DomainError::not_found(format!(
            "product {}",
            adjustment.product_id
        )));
    }

    let previous_stock = product.stock();
    let quantity = adjustment.quantity;

    let new_stock = match adjustment.mode {
        AdjustmentMode::Increase => previous_stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("stock would overflow"))?,
        AdjustmentMode::Decrease => {
            if quantity > previous_stock {
                return Err(DomainError::insufficient_stock(previous_stock, quantity));
            }
            previous_stock - quantity
        }
        AdjustmentMode::SetAbsolute => quantity,
    };

    Ok(Transition {
        previous_stock,
        new_stock,
    })
}

/// Decide and produce the updated product snapshot (not yet persisted).
pub fn apply(product: &Product, adjustment: &StockAdjustment) -> DomainResult<(Product, Transition)> {
    let transition = decide(product, adjustment)?;
    let updated = product.with_stock(transition.new_stock)?;
    Ok((updated, transition))
}
