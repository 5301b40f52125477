//! Error types for podbay.
//!
//! [`StorageError`] is the tagged union every object-storage operation
//! resolves to; callers pattern-match on the variant, never on message
//! text.  [`AppError`] wraps it (plus the handful of non-storage failure
//! modes the presentation layer has) and implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(AppError::...)` and get the right page rendered.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::pages;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Failure modes of the object-storage contract.
///
/// Every list/get/put resolves to either a success value or exactly one
/// of these.  `NotFound` and the transport-level variants are kept
/// distinct on purpose: the read view renders a different message for
/// "the object genuinely doesn't exist" than for "the backend call
/// failed".
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object does not exist in the active backend.
    #[error("the requested object does not exist")]
    NotFound,

    /// A cloud storage operation was invoked while no cloud backend is
    /// active (mode `None`, or the probe has not resolved yet).
    #[error("no cloud storage backend is active on this platform")]
    WrongPlatform,

    /// The backend could not be reached or rejected the call for a
    /// reason other than a missing object (auth failure, bad resource
    /// name, service error).
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A network-level error that is plausibly retryable: timeout,
    /// connection reset, dispatch failure.
    #[error("transient storage failure: {0}")]
    TransientFailure(String),
}

impl StorageError {
    /// Short tag for logs and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotFound => "NotFound",
            StorageError::WrongPlatform => "WrongPlatform",
            StorageError::BackendUnavailable(_) => "BackendUnavailable",
            StorageError::TransientFailure(_) => "TransientFailure",
        }
    }
}

/// Presentation-layer error type returned by every handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// An object-storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A submitted filename failed validation.
    #[error("invalid filename: \"{name}\"")]
    InvalidFilename { name: String },

    /// The sibling microservice did not answer.
    #[error("microservice endpoint not available")]
    MicroserviceUnavailable,

    /// Catch-all for unexpected internal errors (I/O, rendering, ...).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.into())
    }
}

impl AppError {
    /// Return the error code string used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Storage(e) => e.code(),
            AppError::InvalidFilename { .. } => "InvalidFilename",
            AppError::MicroserviceUnavailable => "MicroserviceUnavailable",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::WrongPlatform) => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::BackendUnavailable(_)) => StatusCode::BAD_GATEWAY,
            AppError::Storage(StorageError::TransientFailure(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::InvalidFilename { .. } => StatusCode::BAD_REQUEST,
            AppError::MicroserviceUnavailable => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // NotFound and WrongPlatform get dedicated pages; everything else
        // renders the generic error page with the detail text.
        let body = match &self {
            AppError::Storage(StorageError::NotFound) => pages::object_not_found_page(),
            AppError::Storage(StorageError::WrongPlatform) => pages::wrong_platform_page(),
            other => pages::error_page(other.code(), &other.to_string()),
        };

        tracing::error!(code = self.code(), "request failed: {}", self);

        (
            status,
            [("content-type", "text/html; charset=utf-8".to_string())],
            body,
        )
            .into_response()
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_uppercase());
    }

    #[test]
    fn test_storage_error_codes_are_distinct() {
        let errors = [
            StorageError::NotFound,
            StorageError::WrongPlatform,
            StorageError::BackendUnavailable("x".into()),
            StorageError::TransientFailure("y".into()),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Storage(StorageError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Storage(StorageError::WrongPlatform).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Storage(StorageError::TransientFailure("t".into())).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::InvalidFilename {
                name: "../x".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_and_transport_render_differently() {
        let not_found = AppError::Storage(StorageError::NotFound);
        let transport = AppError::Storage(StorageError::TransientFailure("reset".into()));
        assert_ne!(not_found.code(), transport.code());
        assert_ne!(not_found.status_code(), transport.status_code());
    }
}
