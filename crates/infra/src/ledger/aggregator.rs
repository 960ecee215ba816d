//! Read-only summaries over the active product set.
//!
//! Aggregations take no locks; under concurrent adjustments they may reflect a
//! slightly stale snapshot.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, instrument};

use stockroom_core::{Entity, StoreId};
use stockroom_inventory::{StoreRevenue, StoreStats, low_stock, validate_threshold};
use stockroom_products::{Product, Store};

use crate::config::LedgerConfig;
use crate::repository::CatalogRepository;

use super::error::LedgerError;

/// A low-stock hit, with enough store identity to say where the shortage is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockProduct {
    pub product: Product,
    pub store_id: StoreId,
    /// `None` only when the owning store record is missing.
    pub store_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Aggregator<R> {
    repository: R,
    config: LedgerConfig,
}

impl<R> Aggregator<R> {
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, LedgerConfig::default())
    }

    pub fn with_config(repository: R, config: LedgerConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

impl<R> Aggregator<R>
where
    R: CatalogRepository,
{
    #[instrument(skip(self), fields(store_id = %store_id), err)]
    pub async fn get_store_stats(
        &self,
        store_id: StoreId,
        low_stock_threshold: Option<i64>,
    ) -> Result<StoreStats, LedgerError> {
        let threshold = low_stock_threshold.unwrap_or(self.config.default_low_stock_threshold);
        validate_threshold(threshold)?;

        self.active_store(store_id).await?;
        let products = self.repository.list_products_by_store(store_id, true).await?;

        Ok(StoreStats::compute(store_id, &products, threshold)?)
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    pub async fn get_store_revenue(&self, store_id: StoreId) -> Result<StoreRevenue, LedgerError> {
        self.active_store(store_id).await?;
        let products = self.repository.list_products_by_store(store_id, true).await?;

        Ok(StoreRevenue::compute(store_id, &products)?)
    }

    /// System-wide low-stock scan, ascending by stock.
    #[instrument(skip(self), err)]
    pub async fn find_low_stock(
        &self,
        threshold: Option<i64>,
    ) -> Result<Vec<LowStockProduct>, LedgerError> {
        let threshold = threshold.unwrap_or(self.config.default_low_stock_threshold);
        validate_threshold(threshold)?;

        let candidates = if self.config.push_down_low_stock {
            self.repository.list_low_stock_products(threshold).await?
        } else {
            self.repository.list_all_products(true).await?
        };
        let low = low_stock(candidates, threshold)?;
        debug!(count = low.len(), threshold, "low-stock scan");

        let mut names: HashMap<StoreId, Option<String>> = HashMap::new();
        let mut hits = Vec::with_capacity(low.len());
        for product in low {
            let store_id = product.store_id();
            let store_name = match names.get(&store_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .repository
                        .get_store_by_id(store_id)
                        .await?
                        .map(|s| s.name().to_string());
                    names.insert(store_id, name.clone());
                    name
                }
            };
            hits.push(LowStockProduct {
                product,
                store_id,
                store_name,
            });
        }
        Ok(hits)
    }

    async fn active_store(&self, store_id: StoreId) -> Result<Store, LedgerError> {
        self.repository
            .get_store_by_id(store_id)
            .await?
            .filter(|s| s.is_active())
            .ok_or_else(|| LedgerError::NotFound(format!("store {store_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use stockroom_core::ProductId;
    use stockroom_products::NewProduct;

    use crate::repository::InMemoryCatalogRepository;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn add(
        repo: &InMemoryCatalogRepository,
        store: &Store,
        price: &str,
        stock: i64,
        category: Option<&str>,
    ) -> Product {
        let id = ProductId::new();
        let product = Product::create(
            NewProduct {
                id,
                store_id: store.id_typed(),
                sku: format!("SKU-{id}"),
                name: "Producto".to_string(),
                price: dec(price),
                stock,
                category: category.map(str::to_string),
            },
            Utc::now(),
        )
        .unwrap();
        repo.insert_product(product).unwrap()
    }

    fn store(repo: &InMemoryCatalogRepository, name: &str) -> Store {
        let store = Store::new(StoreId::new(), name).unwrap();
        repo.insert_store(store.clone()).unwrap();
        store
    }

    #[tokio::test]
    async fn stats_use_configured_default_threshold() {
        let repo = InMemoryCatalogRepository::arc();
        let s = store(&repo, "Centro");
        add(&repo, &s, "1", 4, None);
        add(&repo, &s, "1", 6, None);

        let aggregator = Aggregator::with_config(
            repo.clone(),
            LedgerConfig {
                default_low_stock_threshold: 5,
                ..LedgerConfig::default()
            },
        );

        let stats = aggregator.get_store_stats(s.id_typed(), None).await.unwrap();
        assert_eq!(stats.low_stock_threshold, 5);
        assert_eq!(stats.low_stock_products, 1);

        let stats = aggregator.get_store_stats(s.id_typed(), Some(6)).await.unwrap();
        assert_eq!(stats.low_stock_products, 2);
    }

    #[tokio::test]
    async fn missing_or_inactive_store_is_not_found() {
        let repo = InMemoryCatalogRepository::arc();
        let mut closed = Store::new(StoreId::new(), "Cerrada").unwrap();
        closed.deactivate();
        repo.insert_store(closed.clone()).unwrap();

        let aggregator = Aggregator::new(repo);

        for id in [StoreId::new(), closed.id_typed()] {
            assert!(matches!(
                aggregator.get_store_stats(id, None).await,
                Err(LedgerError::NotFound(_))
            ));
            assert!(matches!(
                aggregator.get_store_revenue(id).await,
                Err(LedgerError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn negative_threshold_is_invalid_argument() {
        let repo = InMemoryCatalogRepository::arc();
        let s = store(&repo, "Centro");
        let aggregator = Aggregator::new(repo);

        assert!(matches!(
            aggregator.find_low_stock(Some(-1)).await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            aggregator.get_store_stats(s.id_typed(), Some(-1)).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn low_stock_spans_stores_and_names_them() {
        let repo = InMemoryCatalogRepository::arc();
        let norte = store(&repo, "Norte");
        let sur = store(&repo, "Sur");
        add(&repo, &norte, "1", 7, None);
        add(&repo, &sur, "1", 2, None);
        add(&repo, &norte, "1", 99, None);

        let hits = Aggregator::new(repo).find_low_stock(None).await.unwrap();
        let rendered: Vec<(i64, Option<&str>)> = hits
            .iter()
            .map(|h| (h.product.stock(), h.store_name.as_deref()))
            .collect();
        assert_eq!(rendered, vec![(2, Some("Sur")), (7, Some("Norte"))]);
        assert_eq!(hits[0].store_id, sur.id_typed());
    }

    #[tokio::test]
    async fn revenue_ignores_inactive_products() {
        let repo: Arc<InMemoryCatalogRepository> = InMemoryCatalogRepository::arc();
        let s = store(&repo, "Centro");
        add(&repo, &s, "10", 2, None);
        let hidden = add(&repo, &s, "500", 1, None);
        let mut gone = hidden.clone();
        gone.deactivate();
        repo.save_product(gone, stockroom_core::ExpectedVersion::of(&hidden))
            .await
            .unwrap();

        let revenue = Aggregator::new(repo).get_store_revenue(s.id_typed()).await.unwrap();
        assert_eq!(revenue.total_products, 1);
        assert_eq!(revenue.total_inventory_value, dec("20"));
        assert_eq!(revenue.average_product_price, dec("10"));
    }

    #[tokio::test]
    async fn oversized_inventory_value_is_reported_not_panicked() {
        let repo = InMemoryCatalogRepository::arc();
        let s = store(&repo, "Mayorista");
        add(&repo, &s, "10000000000", i64::MAX, None);
        let aggregator = Aggregator::new(repo);

        assert!(matches!(
            aggregator.get_store_stats(s.id_typed(), None).await,
            Err(LedgerError::Overflow(_))
        ));
        assert!(matches!(
            aggregator.get_store_revenue(s.id_typed()).await,
            Err(LedgerError::Overflow(_))
        ));
    }

    #[tokio::test]
    async fn low_stock_hit_serializes_with_decimal_strings() {
        let repo = InMemoryCatalogRepository::arc();
        let s = store(&repo, "Centro");
        add(&repo, &s, "19.99", 3, Some("Bebidas"));

        let hits = Aggregator::new(repo).find_low_stock(None).await.unwrap();
        let json = serde_json::to_value(&hits).unwrap();

        assert_eq!(json[0]["store_name"], "Centro");
        assert_eq!(json[0]["store_id"], s.id_typed().to_string());
        assert_eq!(json[0]["product"]["price"], "19.99");
        assert_eq!(json[0]["product"]["stock"], 3);
        assert_eq!(json[0]["product"]["category"], "Bebidas");
    }
}
