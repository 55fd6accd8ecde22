//! # Auth Cookie
//!
//! Builds the `auth_token` Set-Cookie headers and reads cookies back from
//! requests.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, Utc};

pub const AUTH_COOKIE: &str = "auth_token";

/// Cookie lifetime when the user asked to be remembered
pub const REMEMBER_HOURS: i64 = 24;
/// Cookie lifetime for every other login and every token refresh
pub const DEFAULT_HOURS: i64 = 3;

const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Expiry for a freshly issued session cookie
pub fn session_expiry(remember_me: bool) -> DateTime<Utc> {
    let hours = if remember_me {
        REMEMBER_HOURS
    } else {
        DEFAULT_HOURS
    };
    Utc::now() + Duration::hours(hours)
}

/// IMF-fixdate, as used by the `Expires` attribute
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// SameSite policy for cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie configuration
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: AUTH_COOKIE.to_string(),
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
        }
    }
}

impl CookieConfig {
    /// Build Set-Cookie header value expiring at `expires`
    pub fn build_set_cookie(&self, value: &str, expires: DateTime<Utc>) -> String {
        let mut cookie = format!("{}={}; Expires={}", self.name, value, http_date(expires));
        self.push_attributes(&mut cookie);
        cookie
    }

    /// Build Set-Cookie header that clears the cookie
    pub fn build_clear_cookie(&self) -> String {
        let mut cookie = format!("{}=; Expires={}; Max-Age=0", self.name, EPOCH_HTTP_DATE);
        self.push_attributes(&mut cookie);
        cookie
    }

    fn push_attributes(&self, cookie: &mut String) {
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        cookie.push_str(&format!("; Path={}", self.path));
    }

    pub fn set_cookie_header(
        &self,
        value: &str,
        expires: DateTime<Utc>,
    ) -> Result<HeaderValue, header::InvalidHeaderValue> {
        HeaderValue::from_str(&self.build_set_cookie(value, expires))
    }

    pub fn clear_cookie_header(&self) -> Result<HeaderValue, header::InvalidHeaderValue> {
        HeaderValue::from_str(&self.build_clear_cookie())
    }
}

/// Extract a cookie value from headers
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}
