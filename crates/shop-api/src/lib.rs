//! # shop-api
//!
//! HTTP route layer for shop-accounts.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Account, cart and order routes over an `AccountService`
//! - Authentication guard, auth cookie handling and rate limiting
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/login` | Log in, sets `auth_token` |
//! | GET | `/jwt-login` | Identity of the current token |
//! | POST | `/register` | Create an account |
//! | GET | `/logout` | Clear `auth_token` |
//! | POST | `/find` | Look up a user by email |
//! | POST | `/send-code` | Issue an email verification code |
//! | POST | `/verify-email` | Confirm a verification code |
//! | GET | `/cart` | Current cart |
//! | POST | `/cart/{product_id}/{size}/{quantity}` | Add to cart |
//! | PUT/DELETE | `/cart/{product_id}/{size}/{quantity}` | Change or remove a cart line |
//! | POST | `/cart/checkout` | Place an order |
//! | DELETE | `/discount/{code_name}` | Remove the cart's discount |
//! | DELETE | `/cancel-order/{order_id}` | Cancel an order |
//! | GET | `/buy-it-again?limit=N` | Previously purchased products |

pub mod cookie;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppConfig, AppState};
