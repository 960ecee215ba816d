//! Integration tests for the ledger services over the in-memory repository.
//!
//! Tests: StockAdjustment → StockAdjuster → CatalogRepository → Aggregator
//!
//! Verifies:
//! - Adjustments persist and aggregates observe them
//! - Concurrent adjustments on one product never lose an update
//! - A race injected between read and save is detected and re-decided
//! - Low-stock pushdown returns the same result as the in-memory scan

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;
    use rust_decimal::Decimal;

    use stockroom_core::{Entity, ExpectedVersion, ProductId, StoreId, Versioned};
    use stockroom_inventory::{AdjustmentMode, CategoryBreakdown, StockAdjustment};
    use stockroom_products::{NewProduct, Product, Store};

    use crate::config::LedgerConfig;
    use crate::ledger::{Aggregator, LedgerError, StockAdjuster};
    use crate::repository::{CatalogRepository, InMemoryCatalogRepository, RepositoryError};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup() -> (Arc<InMemoryCatalogRepository>, Store) {
        let repo = InMemoryCatalogRepository::arc();
        let store = Store::new(StoreId::new(), "Sucursal Centro").unwrap();
        repo.insert_store(store.clone()).unwrap();
        (repo, store)
    }

    fn seed(
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

    async fn stock_of(repo: &InMemoryCatalogRepository, id: ProductId) -> i64 {
        repo.get_product_by_id(id).await.unwrap().unwrap().stock()
    }

    /// Commits one competing adjustment right before the first save it forwards.
    struct RacingRepository {
        inner: Arc<InMemoryCatalogRepository>,
        competing: StockAdjustment,
        fired: AtomicBool,
    }

    #[async_trait::async_trait]
    impl CatalogRepository for RacingRepository {
        async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
            self.inner.get_product_by_id(id).await
        }

        async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
            self.inner.get_product_by_sku(sku).await
        }

        async fn list_products_by_store(
            &self,
            store_id: StoreId,
            active_only: bool,
        ) -> Result<Vec<Product>, RepositoryError> {
            self.inner.list_products_by_store(store_id, active_only).await
        }

        async fn list_all_products(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
            self.inner.list_all_products(active_only).await
        }

        async fn get_store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
            self.inner.get_store_by_id(id).await
        }

        async fn save_product(
            &self,
            product: Product,
            expected: ExpectedVersion,
        ) -> Result<Product, RepositoryError> {
            if !self.fired.swap(true, Ordering::SeqCst) {
                StockAdjuster::new(self.inner.clone())
                    .adjust_stock(self.competing.clone())
                    .await
                    .map_err(|e| RepositoryError::Storage(e.to_string()))?;
            }
            self.inner.save_product(product, expected).await
        }
    }

    #[tokio::test]
    async fn store_stats_scenario_through_the_aggregator() {
        let (repo, store) = setup();
        seed(&repo, &store, "100", 10, Some("Bebidas"));
        seed(&repo, &store, "50", 5, Some("Bebidas"));
        seed(&repo, &store, "200", 3, Some("Alimentos"));

        let stats = Aggregator::new(repo)
            .get_store_stats(store.id_typed(), Some(10))
            .await
            .unwrap();

        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.total_inventory_value, dec("1850"));
        assert_eq!(
            stats.products_by_category,
            vec![
                CategoryBreakdown {
                    category: "Bebidas".to_string(),
                    product_count: 2,
                    total_value: dec("1250"),
                },
                CategoryBreakdown {
                    category: "Alimentos".to_string(),
                    product_count: 1,
                    total_value: dec("600"),
                },
            ]
        );
        assert_eq!(stats.low_stock_products, 3);
        assert_eq!(stats.low_stock_threshold, 10);
    }

    #[tokio::test]
    async fn increase_then_oversized_decrease_leaves_stock_at_150() {
        let (repo, store) = setup();
        let product = seed(&repo, &store, "100", 100, None);
        let adjuster = StockAdjuster::new(repo.clone());

        let outcome = adjuster
            .adjust_stock(StockAdjustment::new(product.id_typed(), 50, AdjustmentMode::Increase))
            .await
            .unwrap();
        assert_eq!((outcome.previous_stock, outcome.new_stock), (100, 150));

        let before = repo.get_product_by_id(product.id_typed()).await.unwrap().unwrap();
        let err = adjuster
            .adjust_stock(StockAdjustment::new(product.id_typed(), 200, AdjustmentMode::Decrease))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                available: 150,
                requested: 200
            }
        );

        let after = repo.get_product_by_id(product.id_typed()).await.unwrap().unwrap();
        assert_eq!(after, before);
        assert_eq!(after.stock(), 150);
    }

    #[tokio::test]
    async fn low_stock_scenario_returns_five_then_eight() {
        let (repo, store) = setup();
        let five = seed(&repo, &store, "1", 5, None);
        let eight = seed(&repo, &store, "1", 8, None);
        seed(&repo, &store, "1", 50, None);

        let hits = Aggregator::new(repo).find_low_stock(Some(10)).await.unwrap();
        let ids: Vec<ProductId> = hits.iter().map(|h| h.product.id_typed()).collect();
        assert_eq!(ids, vec![five.id_typed(), eight.id_typed()]);
        assert!(hits.iter().all(|h| h.store_name.as_deref() == Some("Sucursal Centro")));
    }

    #[tokio::test]
    async fn revenue_of_store_without_active_products_is_zero() {
        let (repo, store) = setup();
        let only = seed(&repo, &store, "12.50", 4, None);
        let mut gone = only.clone();
        gone.deactivate();
        repo.save_product(gone, ExpectedVersion::of(&only)).await.unwrap();

        let revenue = Aggregator::new(repo)
            .get_store_revenue(store.id_typed())
            .await
            .unwrap();

        assert_eq!(revenue.total_products, 0);
        assert_eq!(revenue.total_inventory_value, Decimal::ZERO);
        assert_eq!(revenue.total_stock, 0);
        assert_eq!(revenue.average_product_price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn aggregates_observe_committed_adjustments() {
        let (repo, store) = setup();
        let product = seed(&repo, &store, "2.50", 4, Some("Snacks"));

        StockAdjuster::new(repo.clone())
            .adjust_stock(StockAdjustment::new(product.id_typed(), 40, AdjustmentMode::SetAbsolute))
            .await
            .unwrap();

        let revenue = Aggregator::new(repo)
            .get_store_revenue(store.id_typed())
            .await
            .unwrap();
        assert_eq!(revenue.total_stock, 40);
        assert_eq!(revenue.total_inventory_value, dec("100"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_increases_never_lose_an_update() {
        const WORKERS: i64 = 8;
        const PER_WORKER: i64 = 50;

        let (repo, store) = setup();
        let product = seed(&repo, &store, "1", 0, None);
        let adjuster = StockAdjuster::with_config(
            repo.clone(),
            LedgerConfig {
                max_conflict_retries: 100_000,
                ..LedgerConfig::default()
            },
        );

        let mut handles = Vec::new();
        for _ in 0..WORKERS {
            let adjuster = adjuster.clone();
            let id = product.id_typed();
            handles.push(tokio::spawn(async move {
                for _ in 0..PER_WORKER {
                    adjuster
                        .adjust_stock(StockAdjustment::new(id, 1, AdjustmentMode::Increase))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let n = WORKERS * PER_WORKER;
        let stored = repo.get_product_by_id(product.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.stock(), n);
        assert_eq!(stored.version(), product.version() + n as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_decreases_never_oversell() {
        let (repo, store) = setup();
        let product = seed(&repo, &store, "1", 100, None);
        let adjuster = StockAdjuster::with_config(
            repo.clone(),
            LedgerConfig {
                max_conflict_retries: 100_000,
                ..LedgerConfig::default()
            },
        );

        let mut handles = Vec::new();
        for _ in 0..16 {
            let adjuster = adjuster.clone();
            let id = product.id_typed();
            handles.push(tokio::spawn(async move {
                adjuster
                    .adjust_stock(StockAdjustment::new(id, 10, AdjustmentMode::Decrease))
                    .await
            }));
        }

        let mut committed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(LedgerError::InsufficientStock { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(committed, 10);
        assert_eq!(rejected, 6);
        assert_eq!(stock_of(&repo, product.id_typed()).await, 0);
    }

    #[tokio::test]
    async fn injected_race_is_retried_against_fresh_stock() {
        let (repo, store) = setup();
        let product = seed(&repo, &store, "1", 10, None);

        let racing = RacingRepository {
            inner: repo.clone(),
            competing: StockAdjustment::new(product.id_typed(), 10, AdjustmentMode::Increase),
            fired: AtomicBool::new(false),
        };

        let outcome = StockAdjuster::new(racing)
            .adjust_stock(StockAdjustment::new(product.id_typed(), 5, AdjustmentMode::Increase))
            .await
            .unwrap();

        assert_eq!(outcome.previous_stock, 20);
        assert_eq!(outcome.new_stock, 25);
        assert_eq!(stock_of(&repo, product.id_typed()).await, 25);
    }

    #[tokio::test]
    async fn injected_race_redecides_a_decrease() {
        let (repo, store) = setup();
        let product = seed(&repo, &store, "1", 10, None);

        let racing = RacingRepository {
            inner: repo.clone(),
            competing: StockAdjustment::new(product.id_typed(), 8, AdjustmentMode::Decrease),
            fired: AtomicBool::new(false),
        };

        let err = StockAdjuster::new(racing)
            .adjust_stock(StockAdjustment::new(product.id_typed(), 5, AdjustmentMode::Decrease))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                available: 2,
                requested: 5
            }
        );
        assert_eq!(stock_of(&repo, product.id_typed()).await, 2);
    }

    #[tokio::test]
    async fn unconditional_save_loses_updates_and_versioned_save_does_not() {
        let (repo, store) = setup();
        let product = seed(&repo, &store, "1", 0, None);

        // Two writers read the same snapshot.
        let first = repo.get_product_by_id(product.id_typed()).await.unwrap().unwrap();
        let second = first.clone();

        repo.save_product(first.with_stock(1).unwrap(), ExpectedVersion::Any)
            .await
            .unwrap();
        repo.save_product(second.with_stock(1).unwrap(), ExpectedVersion::Any)
            .await
            .unwrap();
        assert_eq!(stock_of(&repo, product.id_typed()).await, 1, "one increment was lost");

        let a = repo.get_product_by_id(product.id_typed()).await.unwrap().unwrap();
        let b = a.clone();
        repo.save_product(a.with_stock(a.stock() + 1).unwrap(), ExpectedVersion::of(&a))
            .await
            .unwrap();
        let err = repo
            .save_product(b.with_stock(b.stock() + 1).unwrap(), ExpectedVersion::of(&b))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(stock_of(&repo, product.id_typed()).await, 2);
    }

    #[tokio::test]
    async fn pushdown_and_scan_agree() {
        let (repo, store) = setup();
        let other = Store::new(StoreId::new(), "Sucursal Norte").unwrap();
        repo.insert_store(other.clone()).unwrap();

        for (i, stock) in [12, 3, 10, 0, 3, 55, 9, 10, 1].into_iter().enumerate() {
            let owner = if i % 2 == 0 { &store } else { &other };
            let p = seed(&repo, owner, "1", stock, None);
            if i == 4 {
                let mut gone = p.clone();
                gone.deactivate();
                repo.save_product(gone, ExpectedVersion::of(&p)).await.unwrap();
            }
        }

        for threshold in [0, 3, 10, 100] {
            let pushed = Aggregator::with_config(
                repo.clone(),
                LedgerConfig {
                    push_down_low_stock: true,
                    ..LedgerConfig::default()
                },
            )
            .find_low_stock(Some(threshold))
            .await
            .unwrap();
            let scanned = Aggregator::with_config(
                repo.clone(),
                LedgerConfig {
                    push_down_low_stock: false,
                    ..LedgerConfig::default()
                },
            )
            .find_low_stock(Some(threshold))
            .await
            .unwrap();

            assert_eq!(pushed, scanned, "threshold {threshold}");
            assert!(pushed.iter().all(|h| h.product.is_active()));
        }
    }

    #[tokio::test]
    async fn unknown_ids_surface_not_found() {
        let (repo, _store) = setup();

        let err = StockAdjuster::new(repo.clone())
            .adjust_stock(StockAdjustment::new(ProductId::new(), 1, AdjustmentMode::Increase))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = Aggregator::new(repo)
            .get_store_stats(StoreId::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
