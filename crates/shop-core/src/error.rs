//! # Service Error Types
//!
//! Typed error handling for the account/cart handler layer.
//! All handler operations return `Result<T, ServiceError>`.

use serde_json::Value;
use thiserror::Error;

/// An expected failure raised by the handler layer.
///
/// Carries the message and HTTP status the route layer reproduces verbatim,
/// plus an optional structured payload for routes that render JSON errors.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DomainError {
    pub message: String,
    pub status: u16,
    pub data: Option<Value>,
}

impl DomainError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            data: None,
        }
    }

    /// Builder: attach a structured payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, 400)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, 401)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, 404)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(message, 409)
    }
}

/// Core error type for all handler operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Expected, typed failure rendered by the route layer
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Anything else; surfaces as a generic server error
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ServiceError {
    pub fn unexpected(err: impl std::fmt::Display) -> Self {
        ServiceError::Unexpected(err.to_string())
    }

    /// Returns the domain error, if this is one
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Unexpected(_) => None,
        }
    }
}

/// Result type alias for handler operations
pub type ServiceResult<T> = Result<T, ServiceError>;
