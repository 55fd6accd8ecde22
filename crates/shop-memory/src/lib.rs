//! # shop-memory
//!
//! In-memory handler layer for shop-accounts.
//!
//! Implements `shop_core::AccountService` without a database so the HTTP
//! layer can run standalone. Products and discount codes come from
//! `config/products.toml`. New accounts receive the catalog's `on_register`
//! discount; other codes are attached only through
//! `MemoryAccountService::apply_discount`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_memory::{MemoryAccountService, ProductCatalog};
//!
//! let catalog = ProductCatalog::load()?;
//! let service = MemoryAccountService::new(catalog, codec);
//! ```

pub mod catalog;
pub mod password;
pub mod store;

pub use catalog::{CatalogError, DiscountCode, Product, ProductCatalog, SizeStock};
pub use store::MemoryAccountService;
