//! Product/store repository boundary.
//!
//! The ledger services depend only on [`CatalogRepository`]; storage backends
//! live behind it.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCatalogRepository;
pub use postgres::PostgresCatalogRepository;
pub use r#trait::{CatalogRepository, RepositoryError};
