//! # shop-core
//!
//! Core types and traits for the shop-accounts service.
//!
//! This crate provides:
//! - `AccountService` trait, the handler layer behind every route
//! - `DomainError` and `ServiceError` for typed error handling
//! - `Claims`, `Subject` and `TokenCodec` for identity tokens
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{AccountService, Credentials};
//!
//! let outcome = service.login(Credentials::new("a@b.com", "hunter2")).await?;
//! let claims = codec.verify(&outcome.token)?;
//! assert_eq!(claims.user_id(), 1);
//! ```

pub mod error;
pub mod service;
pub mod token;

// Re-exports for convenience
pub use error::{DomainError, ServiceError, ServiceResult};
pub use service::{
    AccountService, CartMutation, CheckoutOutcome, Credentials, LoginOutcome, QuantityUpdate,
    SharedAccountService,
};
pub use token::{Claims, Subject, TokenCodec, TokenError};
