use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ProductId, StoreId, Versioned};

/// Aggregation bucket for products without a category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Input for creating a product (validated by [`Product::create`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub store_id: StoreId,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    pub category: Option<String>,
}

/// Product: a stock-keeping record owned by a store.
///
/// Invariants:
/// - `stock >= 0` at all times
/// - `price >= 0`
/// - `sku` and `name` are non-empty
///
/// `version` starts at 1 and is bumped by the repository on every durable save;
/// the stock adjuster uses it as the compare-and-swap token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    id: ProductId,
    store_id: StoreId,
    sku: String,
    name: String,
    price: Decimal,
    stock: i64,
    category: Option<String>,
    active: bool,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// Validate and create a new, active product at version 1.
    pub fn create(new: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        Self::rehydrate(new, true, 1, now, now)
    }

    /// Rebuild a product from persisted columns, re-checking every invariant.
    pub fn rehydrate(
        new: NewProduct,
        active: bool,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sku = new.sku.trim();
        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if new.price < Decimal::ZERO {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if new.stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(Self {
            id: new.id,
            store_id: new.store_id,
            sku: sku.to_string(),
            name: new.name.trim().to_string(),
            price: new.price,
            stock: new.stock,
            category: normalize_category(new.category),
            active,
            version,
            created_at,
            updated_at,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Bucket used by per-category rollups.
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Copy of this product with a new stock count.
    pub fn with_stock(&self, stock: i64) -> DomainResult<Self> {
        if stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        Ok(Self {
            stock,
            ..self.clone()
        })
    }

    /// Stamp the version and timestamp assigned by a successful save.
    pub fn committed(self, version: u64, updated_at: DateTime<Utc>) -> Self {
        Self {
            version,
            updated_at,
            ..self
        }
    }

    /// Soft-delete.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Versioned for Product {
    fn version(&self) -> u64 {
        self.version
    }
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
