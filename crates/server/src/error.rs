//! Unified error handling.
//!
//! Provides a unified `AppError` type implementing the engine's error
//! taxonomy. All route handlers return `Result<T, AppError>`; the
//! `IntoResponse` impl maps each class to an HTTP status and a stable,
//! human-readable JSON `{"message": ...}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::payment::PaymentError;
use crate::services::shipping::ShippingError;

/// Application-level error type for the lifecycle engine.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed required input (e.g., an empty item list).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown order/return/product id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Actor lacks ownership or the required role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource is in a state that contradicts the request
    /// (duplicate return, illegal transition, lost CAS race).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A business rule denies the action (return window exceeded, order
    /// not yet delivered, unpaid delivery).
    #[error("policy error: {0}")]
    Policy(String),

    /// Payment gateway call failed on the primary path.
    #[error("payment gateway error: {0}")]
    PaymentUpstream(#[from] PaymentError),

    /// Shipping provider call failed on a primary path.
    #[error("shipping provider error: {0}")]
    ShippingUpstream(#[from] ShippingError),

    /// Database operation failed.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Domain errors carry their message to the client; server-side
        // failures are logged and redacted.
        if matches!(self, Self::Repository(_) | Self::Internal(_)) {
            tracing::error!(error = %self, "request error");
        }
        if matches!(self, Self::PaymentUpstream(_) | Self::ShippingUpstream(_)) {
            tracing::warn!(error = %self, "upstream provider error");
        }

        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Policy(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentUpstream(_) | Self::ShippingUpstream(_) => StatusCode::BAD_GATEWAY,
            Self::Repository(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg)
            | Self::Policy(msg) => msg.clone(),
            Self::PaymentUpstream(_) => "payment gateway unavailable".to_owned(),
            Self::ShippingUpstream(_) => "shipping provider unavailable".to_owned(),
            Self::Repository(RepositoryError::NotFound) => "not found".to_owned(),
            Self::Repository(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Repository(_) | Self::Internal(_) => "internal server error".to_owned(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
