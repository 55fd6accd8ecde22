//! # Account Service Trait
//!
//! The handler layer behind the HTTP routes: one method per use case.
//! The route layer only parses, delegates and renders; everything else
//! (password checks, token issuance, cart and order bookkeeping) lives behind
//! this trait.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  AccountService (trait)                     │
//! │  ├── login() / register() / find_user()                     │
//! │  ├── send_code() / verify_email()                           │
//! │  ├── get_cart() / add_to_cart() / update_item_quantity()    │
//! │  ├── checkout_cart() / remove_discount() / cancel_order()   │
//! │  └── buy_it_again()                                         │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                  ┌─────────┴─────────┐
//!          ┌───────┴───────┐   ┌───────┴───────┐
//!          │ MemoryAccount │   │   Database    │
//!          │    Service    │   │   (future)    │
//!          └───────────────┘   └───────────────┘
//! ```

use crate::error::ServiceResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Login/registration credentials as they arrived in the request body.
///
/// Fields stay optional; deciding what a missing field means is the
/// handler layer's job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: Value,
}

/// Result of adding an item to the cart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartMutation {
    pub token: String,
    pub user_data: Value,
}

/// Result of updating (or removing) a cart line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityUpdate {
    pub token: String,
    pub cart: Value,
    pub user_data: Value,
    /// False when the requested quantity could not be applied as asked
    pub valid: bool,
}

/// Result of a successful checkout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOutcome {
    pub token: String,
    pub id: Value,
}

#[async_trait]
pub trait AccountService: Send + Sync {
    /// Authenticate and issue a token plus the user payload.
    async fn login(&self, credentials: Credentials) -> ServiceResult<LoginOutcome>;

    async fn register(&self, credentials: Credentials) -> ServiceResult<()>;

    async fn find_user(&self, email: Option<String>) -> ServiceResult<Value>;

    /// Record (and eventually deliver) a verification code for `email`.
    async fn send_code(&self, email: Option<String>, code: String) -> ServiceResult<()>;

    async fn verify_email(&self, email: Option<String>, code: Option<String>)
        -> ServiceResult<()>;

    async fn get_cart(&self, user_id: i64) -> ServiceResult<Value>;

    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: &str,
        size: &str,
        quantity: i64,
    ) -> ServiceResult<CartMutation>;

    async fn update_item_quantity(
        &self,
        user_id: i64,
        product_id: &str,
        size: &str,
        quantity: i64,
    ) -> ServiceResult<QuantityUpdate>;

    /// Place an order from the user's cart. May fail with a structured payload.
    async fn checkout_cart(&self, user_id: i64, order_details: Value)
        -> ServiceResult<CheckoutOutcome>;

    async fn remove_discount(&self, user_id: i64) -> ServiceResult<()>;

    async fn cancel_order(&self, order_id: &str, user_id: i64) -> ServiceResult<()>;

    /// Previously purchased products, at most `limit` of them.
    async fn buy_it_again(&self, user_id: i64, limit: i64) -> ServiceResult<Value>;
}

/// Type alias for a shared account service (dynamic dispatch)
pub type SharedAccountService = Arc<dyn AccountService>;
