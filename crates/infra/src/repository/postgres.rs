//! Postgres-backed catalog repository.
//!
//! ## Compare-and-swap
//!
//! `save_product` is a single conditional statement:
//!
//! ```text
//! UPDATE products SET ..., version = version + 1
//! WHERE id = $1 AND version = $expected
//! RETURNING ...
//! ```
//!
//! Postgres takes a row lock for the duration of the UPDATE, so two writers that
//! read the same version cannot both match the predicate: the second one sees the
//! bumped version, updates zero rows and gets `RepositoryError::Conflict`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / Io / other | N/A | `Storage` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use stockroom_core::{Entity, ExpectedVersion, ProductId, StoreId, Versioned};
use stockroom_products::{NewProduct, Product, Store};

use super::r#trait::{CatalogRepository, RepositoryError};

/// Schema statements, applied in order by [`PostgresCatalogRepository::ensure_schema`].
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stores (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL,
        active      BOOLEAN NOT NULL DEFAULT TRUE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id          UUID PRIMARY KEY,
        store_id    UUID NOT NULL REFERENCES stores (id),
        sku         TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL,
        price       NUMERIC NOT NULL CHECK (price >= 0),
        stock       BIGINT NOT NULL CHECK (stock >= 0),
        category    TEXT,
        active      BOOLEAN NOT NULL DEFAULT TRUE,
        version     BIGINT NOT NULL DEFAULT 1,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_products_store
        ON products (store_id, created_at, id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_products_active_stock
        ON products (stock)
        WHERE active
    "#,
];

const PRODUCT_COLUMNS: &str =
    "id, store_id, sku, name, price, stock, category, active, version, created_at, updated_at";

/// Postgres-backed catalog repository.
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresCatalogRepository {
    pool: Arc<PgPool>,
}

impl PostgresCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self, store), fields(store_id = %store.id_typed()), err)]
    pub async fn insert_store(&self, store: &Store) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO stores (id, name, active) VALUES ($1, $2, $3)")
            .bind(store.id_typed().as_uuid())
            .bind(store.name())
            .bind(store.is_active())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_store", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed(), sku = product.sku()), err)]
    pub async fn insert_product(&self, product: &Product) -> Result<Product, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO products (
                id, store_id, sku, name, price, stock, category, active, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(product.id_typed().as_uuid())
            .bind(product.store_id().as_uuid())
            .bind(product.sku())
            .bind(product.name())
            .bind(product.price())
            .bind(product.stock())
            .bind(product.category())
            .bind(product.is_active())
            .bind(version_to_db(product.version())?)
            .bind(product.created_at())
            .bind(product.updated_at())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;

        decode_product(&row)
    }

    async fn fetch_products(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        rows.iter().map(decode_product).collect()
    }
}

#[async_trait::async_trait]
impl CatalogRepository for PostgresCatalogRepository {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product_by_id", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
        let row = sqlx::query(&sql)
            .bind(sku.trim())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product_by_sku", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_products_by_store(
        &self,
        store_id: StoreId,
        active_only: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE store_id = $1 AND ($2 = FALSE OR active)
            ORDER BY created_at ASC, id ASC
            "#
        );
        let query = sqlx::query(&sql).bind(store_id.as_uuid()).bind(active_only);
        self.fetch_products("list_products_by_store", query).await
    }

    #[instrument(skip(self), err)]
    async fn list_all_products(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1 = FALSE OR active)
            ORDER BY created_at ASC, id ASC
            "#
        );
        let query = sqlx::query(&sql).bind(active_only);
        self.fetch_products("list_all_products", query).await
    }

    #[instrument(skip(self), err)]
    async fn list_low_stock_products(&self, threshold: i64) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE active AND stock <= $1
            ORDER BY created_at ASC, id ASC
            "#
        );
        let query = sqlx::query(&sql).bind(threshold);
        self.fetch_products("list_low_stock_products", query).await
    }

    #[instrument(skip(self), fields(store_id = %id), err)]
    async fn get_store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, active FROM stores WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_store_by_id", e))?;

        match row {
            Some(row) => {
                let store = StoreRow::from_row(&row)
                    .map_err(|e| RepositoryError::Storage(format!("failed to decode store row: {e}")))?;
                Ok(Some(Store::rehydrate(
                    StoreId::from_uuid(store.id),
                    store.name,
                    store.active,
                )))
            }
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self, product),
        fields(product_id = %product.id_typed(), expected = ?expected),
        err
    )]
    async fn save_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<Product, RepositoryError> {
        let expected_version = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(version_to_db(v)?),
        };

        let sql = format!(
            r#"
            UPDATE products
            SET store_id = $2,
                sku = $3,
                name = $4,
                price = $5,
                stock = $6,
                category = $7,
                active = $8,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND ($9::BIGINT IS NULL OR version = $9)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(product.id_typed().as_uuid())
            .bind(product.store_id().as_uuid())
            .bind(product.sku())
            .bind(product.name())
            .bind(product.price())
            .bind(product.stock())
            .bind(product.category())
            .bind(product.is_active())
            .bind(expected_version)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("save_product", e))?;

        if let Some(row) = row {
            return decode_product(&row);
        }

        // Zero rows updated: either the row is gone or the version moved.
        let current = sqlx::query("SELECT version FROM products WHERE id = $1")
            .bind(product.id_typed().as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("save_product_lookup", e))?;

        match current {
            None => Err(RepositoryError::NotFound(format!("product {}", product.id_typed()))),
            Some(row) => {
                let found: i64 = row
                    .try_get("version")
                    .map_err(|e| RepositoryError::Storage(format!("failed to read version: {e}")))?;
                Err(RepositoryError::Conflict(format!(
                    "product {}: expected {expected:?}, found {found}",
                    product.id_typed()
                )))
            }
        }
    }
}

struct ProductRow {
    id: uuid::Uuid,
    store_id: uuid::Uuid,
    sku: String,
    name: String,
    price: Decimal,
    stock: i64,
    category: Option<String>,
    active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            store_id: row.try_get("store_id")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            category: row.try_get("category")?,
            active: row.try_get("active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

struct StoreRow {
    id: uuid::Uuid,
    name: String,
    active: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoreRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoreRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            active: row.try_get("active")?,
        })
    }
}

fn decode_product(row: &sqlx::postgres::PgRow) -> Result<Product, RepositoryError> {
    let r = ProductRow::from_row(row)
        .map_err(|e| RepositoryError::Storage(format!("failed to decode product row: {e}")))?;

    let version = u64::try_from(r.version)
        .map_err(|_| RepositoryError::Storage(format!("negative version {} in products", r.version)))?;

    Product::rehydrate(
        NewProduct {
            id: ProductId::from_uuid(r.id),
            store_id: StoreId::from_uuid(r.store_id),
            sku: r.sku,
            name: r.name,
            price: r.price,
            stock: r.stock,
            category: r.category,
        },
        r.active,
        version,
        r.created_at,
        r.updated_at,
    )
    .map_err(|e| RepositoryError::Storage(format!("stored product violates invariant: {e}")))
}

fn version_to_db(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version).map_err(|_| RepositoryError::Storage(format!("version {version} out of range")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => RepositoryError::Constraint(msg),
                _ => RepositoryError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Storage(format!("connection pool closed in {operation}"))
        }
        other => RepositoryError::Storage(format!("{operation}: {other}")),
    }
}
