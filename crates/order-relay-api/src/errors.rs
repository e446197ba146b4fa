//! Error types for the HTTP service.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use order_relay_core::webhook::signature::VerificationError;
use order_relay_core::{UpstreamError, ValidationError};
use tracing::error;

/// Request handler errors with HTTP status code mapping.
///
/// The intake endpoints are called by machines (the checkout provider and
/// the storefront backend), so the mapping favors their retry semantics:
///
/// - `400 Bad Request`: permanent client faults (bad signature, missing
///   fields); the caller must not retry.
/// - `401 Unauthorized`: shared-secret mismatch.
/// - `500 Internal Server Error`: an upstream dependency failed while
///   handling a synchronous request; the caller may retry.
///
/// Response bodies carry `{ok: false, error}` except for signature
/// failures, which reply with the plain-text `Webhook Error: ...` shape the
/// checkout provider's dashboard surfaces verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Webhook signature verification failed.
    ///
    /// Maps to: `400 Bad Request` (permanent, do not retry).
    #[error("Webhook Error: {0}")]
    Verification(#[from] VerificationError),

    /// Shared-secret mismatch on an intake endpoint.
    ///
    /// Maps to: `401 Unauthorized`.
    #[error("Unauthorized")]
    Unauthorized,

    /// Required request fields are missing or malformed.
    ///
    /// Maps to: `400 Bad Request` with the message in the body.
    #[error("{0}")]
    BadRequest(String),

    /// An upstream dependency failed during a synchronous request.
    ///
    /// Maps to: `500 Internal Server Error`. The upstream detail is included
    /// so the storefront's logs can tell a board outage from a record miss.
    #[error("Upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    /// Unexpected internal failure.
    ///
    /// Maps to: `500 Internal Server Error` with a generic body; the detail
    /// is only logged.
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

/// Bodies that fail to parse land in the catch-all bucket, matching the
/// generic shape the storefront's error handling already expects.
impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Verification(err) => {
                (StatusCode::BAD_REQUEST, format!("Webhook Error: {err}")).into_response()
            }
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "ok": false, "error": "Unauthorized" })),
            )
                .into_response(),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "ok": false, "error": message })),
            )
                .into_response(),
            Self::Upstream(err) => {
                error!(error = %err, service = err.service(), "Upstream failure during request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "ok": false,
                        "error": "Internal server error",
                        "details": err.to_string(),
                    })),
                )
                    .into_response()
            }
            Self::Internal { message } => {
                error!(error = %message, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "ok": false, "error": "Server error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Service-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Required { field } => Self::Missing { key: field },
            other => Self::Invalid {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
