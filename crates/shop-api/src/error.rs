//! # API Errors
//!
//! Maps handler-layer failures onto HTTP responses. Domain errors keep their
//! own status and message; coercion failures are fixed 400s; anything
//! unexpected becomes a generic 500.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shop_core::{DomainError, ServiceError};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Rendered as its message in plain text
    #[error("{0}")]
    Domain(DomainError),

    /// Rendered as its payload in JSON when it has one
    #[error("{0}")]
    StructuredDomain(DomainError),

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Like `From<ServiceError>`, but keeps a domain error's payload
    pub fn structured(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => ApiError::StructuredDomain(e),
            other => ApiError::from(other),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => ApiError::Domain(e),
            ServiceError::Unexpected(msg) => ApiError::Internal(msg),
        }
    }
}

fn status_of(err: &DomainError) -> StatusCode {
    StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(e) => {
                warn!(status = e.status, "{}", e.message);
                (status_of(&e), e.message).into_response()
            }
            ApiError::StructuredDomain(e) => {
                warn!(status = e.status, "{}", e.message);
                let status = status_of(&e);
                match e.data {
                    Some(data) => (status, Json(data)).into_response(),
                    None => (status, e.message).into_response(),
                }
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::TooManyRequests { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                "Too many requests.",
            )
                .into_response(),
            ApiError::Internal(msg) => {
                error!("Unhandled error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.").into_response()
            }
        }
    }
}
