//! # Authentication Guard
//!
//! Middleware for protected routes. Reads the `auth_token` cookie (or a
//! bearer token), verifies it, and inserts the decoded `Claims` into the
//! request extensions for the route to extract.

use crate::cookie::extract_cookie;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Token from the auth cookie, falling back to `Authorization: Bearer`
pub fn request_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    extract_cookie(headers, cookie_name)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers))
}

/// Middleware that requires a valid identity token
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request_token(req.headers(), &state.cookies.name)
        .ok_or(ApiError::Unauthorized("Authentication token is missing."))?;

    let claims = state.tokens.verify(&token).map_err(|e| {
        warn!(path = %req.uri().path(), "Rejected token: {}", e);
        ApiError::Unauthorized("Authentication token is invalid or expired.")
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
