//! Read-side inventory aggregates.
//!
//! Every fold here is a pure function of a product set. Inactive products are
//! skipped even when the caller passes them in.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

use stockroom_core::money::{checked_sum, line_value, mean, round_currency};
use stockroom_core::{DomainError, DomainResult, Entity, StoreId};
use stockroom_products::Product;

/// Threshold used when the caller does not supply one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

pub fn validate_threshold(threshold: i64) -> DomainResult<()> {
    if threshold < 0 {
        return Err(DomainError::validation(format!(
            "low-stock threshold must be non-negative (got {threshold})"
        )));
    }
    Ok(())
}

/// Per-category rollup inside [`StoreStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub product_count: usize,
    /// Sum of `price * stock`, rounded to 2 decimals per group.
    pub total_value: Decimal,
}

/// Inventory summary for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub store_id: StoreId,
    pub total_products: usize,
    pub total_inventory_value: Decimal,
    /// Groups in order of first encounter.
    pub products_by_category: Vec<CategoryBreakdown>,
    pub low_stock_products: usize,
    pub low_stock_threshold: i64,
}

impl StoreStats {
    pub fn compute(store_id: StoreId, products: &[Product], threshold: i64) -> DomainResult<Self> {
        validate_threshold(threshold)?;

        let mut total_products = 0usize;
        let mut total_value = Decimal::ZERO;
        let mut low_stock_products = 0usize;
        let mut groups: IndexMap<String, (usize, Decimal)> = IndexMap::new();

        for product in in_store(store_id, products) {
            let value = line_value(product.price(), product.stock())?;
            total_products += 1;
            total_value = checked_sum(total_value, value)?;
            if product.stock() <= threshold {
                low_stock_products += 1;
            }

            let group = groups
                .entry(product.category_label().to_string())
                .or_insert((0, Decimal::ZERO));
            group.0 += 1;
            group.1 = checked_sum(group.1, value)?;
        }

        Ok(Self {
            store_id,
            total_products,
            total_inventory_value: round_currency(total_value),
            products_by_category: groups
                .into_iter()
                .map(|(category, (product_count, value))| CategoryBreakdown {
                    category,
                    product_count,
                    total_value: round_currency(value),
                })
                .collect(),
            low_stock_products,
            low_stock_threshold: threshold,
        })
    }
}

/// Revenue-style metrics for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreRevenue {
    pub store_id: StoreId,
    pub total_products: usize,
    pub total_inventory_value: Decimal,
    /// Widened so that many near-`i64::MAX` stocks still sum exactly.
    pub total_stock: i128,
    /// Mean price, rounded to 2 decimals; `0` when the store has no active products.
    pub average_product_price: Decimal,
}

impl StoreRevenue {
    pub fn compute(store_id: StoreId, products: &[Product]) -> DomainResult<Self> {
        let mut total_products = 0usize;
        let mut total_value = Decimal::ZERO;
        let mut total_stock = 0i128;
        let mut price_sum = Decimal::ZERO;

        for product in in_store(store_id, products) {
            total_products += 1;
            total_value = checked_sum(total_value, line_value(product.price(), product.stock())?)?;
            total_stock += i128::from(product.stock());
            price_sum = checked_sum(price_sum, product.price())?;
        }

        Ok(Self {
            store_id,
            total_products,
            total_inventory_value: round_currency(total_value),
            total_stock,
            average_product_price: round_currency(mean(price_sum, total_products)),
        })
    }
}

/// Active products at or below `threshold`, ascending by stock.
///
/// The sort is stable: equal stock keeps the input order.
pub fn low_stock(products: Vec<Product>, threshold: i64) -> DomainResult<Vec<Product>> {
    validate_threshold(threshold)?;

    let mut low: Vec<Product> = products
        .into_iter()
        .filter(|p| p.is_active() && p.stock() <= threshold)
        .collect();
    low.sort_by_key(|p| p.stock());
    Ok(low)
}

fn in_store(store_id: StoreId, products: &[Product]) -> impl Iterator<Item = &Product> {
    products
        .iter()
        .filter(move |p| p.is_active() && p.store_id() == store_id)
}
