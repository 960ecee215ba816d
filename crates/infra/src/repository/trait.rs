use std::sync::Arc;

use thiserror::Error;

use stockroom_core::{Entity, ExpectedVersion, ProductId, StoreId};
use stockroom_products::{Product, Store};

/// Repository operation error.
///
/// These are **infrastructure errors** (storage, concurrency, constraints) as opposed
/// to domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The record addressed by a write does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Compare-and-swap failed: the stored version moved since it was read.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// A storage constraint rejected the write (unique SKU, non-negative stock, ...).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Underlying storage I/O failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Product/store data store consumed by the ledger services.
///
/// ## Read semantics
///
/// Lookups return `Ok(None)` for unknown ids; they do **not** filter on the active
/// flag, callers decide what an inactive record means. Listings are returned in a
/// stable order (insertion order, or creation time for SQL backends) so that
/// "ties keep input order" is well defined for consumers.
///
/// ## Write semantics
///
/// `save_product` is the single atomic step of the stock adjuster's
/// read-modify-write. Implementations must:
/// - reject the write with `Conflict` unless the stored version matches `expected`
/// - bump the version by one and refresh `updated_at` on success
/// - return `NotFound` if the product row does not exist
///
/// Two concurrent adjusters that read the same version can therefore never both
/// commit; the loser re-reads and re-decides.
#[async_trait::async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError>;

    async fn list_products_by_store(
        &self,
        store_id: StoreId,
        active_only: bool,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn list_all_products(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError>;

    /// Active products with `stock <= threshold`, in listing order.
    ///
    /// Backends that can filter in storage should override this; the default
    /// scans `list_all_products(true)`.
    async fn list_low_stock_products(&self, threshold: i64) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .list_all_products(true)
            .await?
            .into_iter()
            .filter(|p| p.is_active() && p.stock() <= threshold)
            .collect())
    }

    async fn get_store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;

    /// Conditionally write back a mutated product (compare-and-swap on version).
    async fn save_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<Product, RepositoryError>;
}

#[async_trait::async_trait]
impl<R> CatalogRepository for Arc<R>
where
    R: CatalogRepository + ?Sized,
{
    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        (**self).get_product_by_id(id).await
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        (**self).get_product_by_sku(sku).await
    }

    async fn list_products_by_store(
        &self,
        store_id: StoreId,
        active_only: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        (**self).list_products_by_store(store_id, active_only).await
    }

    async fn list_all_products(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
        (**self).list_all_products(active_only).await
    }

    async fn list_low_stock_products(&self, threshold: i64) -> Result<Vec<Product>, RepositoryError> {
        (**self).list_low_stock_products(threshold).await
    }

    async fn get_store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        (**self).get_store_by_id(id).await
    }

    async fn save_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<Product, RepositoryError> {
        (**self).save_product(product, expected).await
    }
}
