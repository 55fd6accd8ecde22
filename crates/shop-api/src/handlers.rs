//! # Request Handlers
//!
//! Axum request handlers for the account and cart routes.
//! Each handler parses its inputs, makes exactly one call into the
//! `AccountService`, and renders the result.

use crate::cookie::session_expiry;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use shop_core::{Claims, Credentials};
use std::collections::HashMap;
use tracing::{info, instrument};

const CODE_LENGTH: usize = 4;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Any JSON value; see `is_truthy`
    #[serde(default)]
    pub remember_me: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Verification code: `CODE_LENGTH` digits, each drawn uniformly from 1..=9
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(1..=9u8)))
        .collect()
}

/// Loose flag reading: `null`, `false`, `0`, `""`, `[]` and `{}` are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Integer coercion for path and query parameters
fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn auth_cookie(
    state: &AppState,
    token: &str,
    expires: DateTime<Utc>,
) -> Result<HeaderValue, ApiError> {
    state
        .cookies
        .set_cookie_header(token, expires)
        .map_err(ApiError::internal)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "shop-accounts",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// POST /login
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let remember_me = request.remember_me.as_ref().is_some_and(is_truthy);
    let credentials = Credentials {
        email: request.email,
        password: request.password,
    };

    let outcome = state.service.login(credentials).await?;
    let cookie = auth_cookie(&state, &outcome.token, session_expiry(remember_me))?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(outcome.user)).into_response())
}

/// GET /jwt-login
pub async fn jwt_login(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(claims.sub)
}

/// POST /register
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<Credentials>,
) -> Result<Response, ApiError> {
    state.service.register(request).await?;
    Ok((StatusCode::CREATED, "Account created successfully.").into_response())
}

/// GET /logout
pub async fn logout(State(state): State<AppState>) -> Result<Response, ApiError> {
    let cookie = state
        .cookies
        .clear_cookie_header()
        .map_err(ApiError::internal)?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        "Logged out successfully.",
    )
        .into_response())
}

/// POST /find
#[instrument(skip(state, request))]
pub async fn find_user(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<Response, ApiError> {
    let user = state.service.find_user(request.email).await?;
    Ok(Json(user).into_response())
}

/// POST /send-code
#[instrument(skip(state, request))]
pub async fn send_code(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<Response, ApiError> {
    let code = generate_code();
    state.service.send_code(request.email, code.clone()).await?;
    // Returned in the body until email delivery exists
    Ok((StatusCode::CREATED, code).into_response())
}

/// POST /verify-email
#[instrument(skip(state, request))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Response, ApiError> {
    state
        .service
        .verify_email(request.email, request.code)
        .await?;
    Ok((StatusCode::OK, "Email verified.").into_response())
}

/// GET /cart
#[instrument(skip_all, fields(user_id = claims.user_id()))]
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let cart = state.service.get_cart(claims.user_id()).await?;
    Ok(Json(cart).into_response())
}

/// POST /cart/{product_id}/{size}/{quantity}
#[instrument(skip(state, claims), fields(user_id = claims.user_id()))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((product_id, size, quantity)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let quantity = parse_int(&quantity).ok_or(ApiError::BadRequest("Invalid quantity."))?;

    let result = state
        .service
        .add_to_cart(claims.user_id(), &product_id, &size, quantity)
        .await?;
    let cookie = auth_cookie(&state, &result.token, session_expiry(false))?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(result.user_data)).into_response())
}

/// PUT/DELETE /cart/{product_id}/{size}/{quantity}
#[instrument(skip(state, claims), fields(user_id = claims.user_id()))]
pub async fn update_item_quantity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((product_id, size, quantity)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let quantity = parse_int(&quantity).ok_or(ApiError::BadRequest("Invalid quantity."))?;

    let update = state
        .service
        .update_item_quantity(claims.user_id(), &product_id, &size, quantity)
        .await?;
    let cookie = auth_cookie(&state, &update.token, session_expiry(false))?;
    let status = if update.valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "cart": update.cart, "user_data": update.user_data })),
    )
        .into_response())
}

/// POST /cart/checkout
#[instrument(skip_all, fields(user_id = claims.user_id()))]
pub async fn checkout_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(order_details): Json<Value>,
) -> Result<Response, ApiError> {
    let outcome = state
        .service
        .checkout_cart(claims.user_id(), order_details)
        .await
        .map_err(ApiError::structured)?;
    let cookie = auth_cookie(&state, &outcome.token, session_expiry(false))?;

    info!(order_id = %outcome.id, "Checkout completed");
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "id": outcome.id })),
    )
        .into_response())
}

/// DELETE /discount/{code_name}
///
/// The code name is not forwarded: the service clears whatever discount the
/// user's cart carries.
#[instrument(skip(state, claims), fields(user_id = claims.user_id()))]
pub async fn remove_discount(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(code_name): Path<String>,
) -> Result<Response, ApiError> {
    state.service.remove_discount(claims.user_id()).await?;
    Ok((StatusCode::OK, "Discount code was removed.").into_response())
}

/// DELETE /cancel-order/{order_id}
#[instrument(skip(state, claims), fields(user_id = claims.user_id()))]
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_id): Path<String>,
) -> Result<Response, ApiError> {
    state
        .service
        .cancel_order(&order_id, claims.user_id())
        .await?;
    Ok((StatusCode::OK, "Order was successfully cancelled.").into_response())
}

/// GET /buy-it-again?limit=N
#[instrument(skip(state, claims), fields(user_id = claims.user_id()))]
pub async fn buy_it_again(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let limit = params.get("limit").map(String::as_str).unwrap_or("");
    if limit.is_empty() {
        return Err(ApiError::BadRequest("Limit is not specified."));
    }
    let limit = parse_int(limit).ok_or(ApiError::BadRequest("'limit' is not a number."))?;

    let products = state.service.buy_it_again(claims.user_id(), limit).await?;
    Ok(Json(products).into_response())
}
