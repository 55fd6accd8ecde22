//! # Routes
//!
//! Axum router configuration for the account and cart API.

use crate::state::AppState;
use crate::{guard, handlers, rate_limit};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Public:
///   - POST /login, /register, /find, /verify-email
///   - POST /send-code (rate limited per peer address)
///
/// - Authenticated:
///   - GET    /jwt-login, /logout, /cart, /buy-it-again
///   - POST   /cart/{product_id}/{size}/{quantity}
///   - PUT    /cart/{product_id}/{size}/{quantity}
///   - DELETE /cart/{product_id}/{size}/{quantity}
///   - POST   /cart/checkout
///   - DELETE /discount/{code_name}
///   - DELETE /cancel-order/{order_id}
pub fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/register", post(handlers::register))
        .route("/find", post(handlers::find_user))
        .route("/verify-email", post(handlers::verify_email));

    let limited_routes = rate_limit::limit_send_code(
        Router::new().route("/send-code", post(handlers::send_code)),
        &state.config,
    )?;

    let protected_routes = Router::new()
        .route("/jwt-login", get(handlers::jwt_login))
        .route("/logout", get(handlers::logout))
        // Cart
        .route("/cart", get(handlers::get_cart))
        .route("/cart/checkout", post(handlers::checkout_cart))
        .route(
            "/cart/{product_id}/{size}/{quantity}",
            post(handlers::add_to_cart)
                .put(handlers::update_item_quantity)
                .delete(handlers::update_item_quantity),
        )
        .route("/discount/{code_name}", delete(handlers::remove_discount))
        // Orders
        .route("/cancel-order/{order_id}", delete(handlers::cancel_order))
        .route("/buy-it-again", get(handlers::buy_it_again))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_identity,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .merge(public_routes)
        .merge(limited_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}
