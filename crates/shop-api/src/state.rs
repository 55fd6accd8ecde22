//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the handler layer, token codec, cookie policy and config.

use crate::cookie::CookieConfig;
use anyhow::Context;
use shop_core::{SharedAccountService, TokenCodec};

const DEV_JWT_SECRET: &str = "dev-only-secret-change-me";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// HS256 secret shared by token issuance and the guard
    pub jwt_secret: String,
    /// Token lifetime in hours
    pub token_ttl_hours: i64,
    /// Mark the auth cookie `Secure`
    pub cookie_secure: bool,
    /// `/send-code` budget per client and window
    pub send_code_limit: u32,
    pub send_code_window_secs: u64,
}

impl AppConfig {
    /// Load from environment variables (and `.env` if present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let production = environment == "production";

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ if production => anyhow::bail!("JWT_SECRET must be set in production"),
            _ => {
                tracing::warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let send_code_limit = parse_or(&lookup, "SEND_CODE_LIMIT", 500)?;
        let send_code_window_secs = parse_or(&lookup, "SEND_CODE_WINDOW_SECS", 300)?;
        if send_code_limit == 0 || send_code_window_secs == 0 {
            anyhow::bail!("SEND_CODE_LIMIT and SEND_CODE_WINDOW_SECS must be positive");
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            environment,
            jwt_secret,
            token_ttl_hours: parse_or(&lookup, "TOKEN_TTL_HOURS", 24)?,
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", production)?,
            send_code_limit,
            send_code_window_secs,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn token_codec(&self) -> TokenCodec {
        TokenCodec::new(&self.jwt_secret, chrono::Duration::hours(self.token_ttl_hours))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Handler layer
    pub service: SharedAccountService,
    /// Verifies identity tokens for protected routes
    pub tokens: TokenCodec,
    /// Auth cookie policy
    pub cookies: CookieConfig,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, service: SharedAccountService) -> Self {
        let cookies = CookieConfig {
            secure: config.cookie_secure,
            ..CookieConfig::default()
        };

        Self {
            service,
            tokens: config.token_codec(),
            cookies,
            config,
        }
    }
}
