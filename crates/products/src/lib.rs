//! Products/stores domain module.
//!
//! This crate contains the records the ledger operates on, with their
//! invariants enforced at construction (no IO, no HTTP, no storage).

pub mod product;
pub mod store;

pub use product::{NewProduct, Product, UNCATEGORIZED};
pub use store::Store;
