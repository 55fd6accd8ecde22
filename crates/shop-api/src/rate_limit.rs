//! # Rate Limiting
//!
//! Per-client budget for `/send-code`, enforced with `tower_governor`.
//! Clients are keyed by peer address only; forwarded headers come from the
//! client and are never trusted for keying.

use crate::error::ApiError;
use crate::state::{AppConfig, AppState};
use anyhow::Context;
use axum::{
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::{debug, warn};

/// How often idle client entries are dropped from the limiter
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Milliseconds between replenished requests so that `limit` requests fit
/// in `window_secs`, with the whole budget available as a burst
pub fn replenish_interval_ms(limit: u32, window_secs: u64) -> u64 {
    let window_ms = window_secs.saturating_mul(1000);
    (window_ms / u64::from(limit.max(1))).max(1)
}

/// Apply the `/send-code` budget to every route on `router`
pub fn limit_send_code(
    router: Router<AppState>,
    config: &AppConfig,
) -> anyhow::Result<Router<AppState>> {
    let governor = GovernorConfigBuilder::default()
        .per_millisecond(replenish_interval_ms(
            config.send_code_limit,
            config.send_code_window_secs,
        ))
        .burst_size(config.send_code_limit)
        .finish()
        .context("Invalid send-code rate limit")?;

    // Keys stay in the limiter until pruned
    let limiter = governor.limiter().clone();
    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                limiter.retain_recent();
                debug!(clients = limiter.len(), "Pruned send-code limiter");
            }
        });
    }

    Ok(router
        .route_layer(GovernorLayer {
            config: Arc::new(governor),
        })
        .route_layer(middleware::map_response(render_rejection)))
}

/// Seconds to wait, from the governor's `retry-after` or `x-ratelimit-after`
pub fn retry_after_secs(headers: &HeaderMap) -> u64 {
    ["retry-after", "x-ratelimit-after"]
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok()?.trim().parse::<u64>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Re-render governor rejections as the API's 429
async fn render_rejection(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let retry_after_secs = retry_after_secs(response.headers());
    warn!(retry_after_secs, "Send-code rate limit exceeded");
    ApiError::TooManyRequests { retry_after_secs }.into_response()
}
