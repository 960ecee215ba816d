use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use stockroom_core::{Entity, ExpectedVersion, ProductId, StoreId, Versioned};
use stockroom_products::{Product, Store};

use super::r#trait::{CatalogRepository, RepositoryError};

#[derive(Debug, Default)]
struct Catalog {
    stores: HashMap<StoreId, Store>,
    products: HashMap<ProductId, Product>,
    /// Insertion order; defines listing order.
    order: Vec<ProductId>,
    skus: HashMap<String, ProductId>,
}

impl Catalog {
    fn ordered(&self, keep: impl Fn(&Product) -> bool) -> Vec<Product> {
        self.order
            .iter()
            .filter_map(|id| self.products.get(id))
            .filter(|p| keep(p))
            .cloned()
            .collect()
    }
}

/// In-memory catalog repository.
///
/// Intended for tests/dev. `save_product` holds the write lock across the version
/// check and the write, which makes it an atomic compare-and-swap.
#[derive(Debug, Default)]
pub struct InMemoryCatalogRepository {
    inner: RwLock<Catalog>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed or replace a store.
    pub fn insert_store(&self, store: Store) -> Result<(), RepositoryError> {
        let mut catalog = self.write()?;
        catalog.stores.insert(store.id_typed(), store);
        Ok(())
    }

    /// Seed a new product. The owning store must exist and the SKU must be unused.
    pub fn insert_product(&self, product: Product) -> Result<Product, RepositoryError> {
        let mut catalog = self.write()?;
        let id = product.id_typed();

        if catalog.products.contains_key(&id) {
            return Err(RepositoryError::Constraint(format!("product {id} already exists")));
        }
        if !catalog.stores.contains_key(&product.store_id()) {
            return Err(RepositoryError::Constraint(format!(
                "store {} does not exist",
                product.store_id()
            )));
        }
        if catalog.skus.contains_key(product.sku()) {
            return Err(RepositoryError::Constraint(format!(
                "sku '{}' already in use",
                product.sku()
            )));
        }

        catalog.skus.insert(product.sku().to_string(), id);
        catalog.order.push(id);
        catalog.products.insert(id, product.clone());
        Ok(product)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Catalog>, RepositoryError> {
        self.inner
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Catalog>, RepositoryError> {
        self.inner
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let catalog = self.read()?;
        Ok(catalog
            .skus
            .get(sku.trim())
            .and_then(|id| catalog.products.get(id))
            .cloned())
    }

    async fn list_products_by_store(
        &self,
        store_id: StoreId,
        active_only: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .read()?
            .ordered(|p| p.store_id() == store_id && (!active_only || p.is_active())))
    }

    async fn list_all_products(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.read()?.ordered(|p| !active_only || p.is_active()))
    }

    async fn list_low_stock_products(&self, threshold: i64) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .read()?
            .ordered(|p| p.is_active() && p.stock() <= threshold))
    }

    async fn get_store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        Ok(self.read()?.stores.get(&id).cloned())
    }

    async fn save_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<Product, RepositoryError> {
        let mut catalog = self.write()?;
        let id = product.id_typed();

        let (current_version, current_sku) = match catalog.products.get(&id) {
            Some(existing) => (existing.version(), existing.sku().to_string()),
            None => return Err(RepositoryError::NotFound(format!("product {id}"))),
        };

        expected
            .check(current_version)
            .map_err(|e| RepositoryError::Conflict(format!("product {id}: {e}")))?;

        if current_sku != product.sku() {
            if catalog.skus.contains_key(product.sku()) {
                return Err(RepositoryError::Constraint(format!(
                    "sku '{}' already in use",
                    product.sku()
                )));
            }
            catalog.skus.remove(&current_sku);
            catalog.skus.insert(product.sku().to_string(), id);
        }

        let committed = product.committed(current_version + 1, Utc::now());
        catalog.products.insert(id, committed.clone());
        Ok(committed)
    }
}
