//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler ── Result<Json<T>, ApiError>                                   │
//! │                │                                                        │
//! │                ├── CartError        ──► 400 / 409 / 422                 │
//! │                ├── CheckoutError    ──► 400 / 409 / 422 / 503 / 500     │
//! │                ├── ServiceError     ──► 400 / 503                       │
//! │                └── ValidationError  ──► 400                             │
//! │                                                                         │
//! │  Response body: { "code": "OUT_OF_STOCK", "message": "..." }            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-line checkout problems are not errors: they come back inside a
//! 200 checkout response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use techshop_checkout::{CheckoutError, ServiceError};
use techshop_core::{CartError, ValidationError};

/// Error body returned by every failing endpoint.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Product not found: pixel-8"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Quantity is zero, negative or above the limit (400)
    InvalidQuantity,

    /// Cart holds too many distinct products (422)
    CartTooLarge,

    /// Requested more than the last known stock (409)
    OutOfStock,

    /// Checkout with nothing in the cart (422)
    EmptyCart,

    /// The attempt is reserving inventory (409)
    CheckoutInProgress,

    /// The attempt already finished (409)
    AlreadySettled,

    /// The attempt id belongs to another customer or cart (409)
    AttemptConflict,

    /// A collaborator failed or timed out (503)
    ServiceUnavailable,

    /// Some stock could not be restored (500)
    RollbackIncomplete,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::InvalidQuantity => StatusCode::BAD_REQUEST,
            ErrorCode::CartTooLarge | ErrorCode::EmptyCart => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::OutOfStock
            | ErrorCode::CheckoutInProgress
            | ErrorCode::AlreadySettled
            | ErrorCode::AttemptConflict => StatusCode::CONFLICT,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::RollbackIncomplete | ErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new(ErrorCode::ValidationError, err.to_string())
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        let code = match &err {
            CartError::InvalidQuantity { .. } | CartError::QuantityTooLarge { .. } => {
                ErrorCode::InvalidQuantity
            }
            CartError::CartTooLarge { .. } => ErrorCode::CartTooLarge,
            CartError::ExceedsKnownStock { .. } => ErrorCode::OutOfStock,
            CartError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected(message) => ApiError::new(ErrorCode::ValidationError, message),
            ServiceError::Conflict(message) => ApiError::new(ErrorCode::AttemptConflict, message),
            other => {
                error!(error = %other, "Collaborator failed");
                ApiError::new(ErrorCode::ServiceUnavailable, other.to_string())
            }
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        let code = match &err {
            CheckoutError::EmptyCart => ErrorCode::EmptyCart,
            CheckoutError::Validation(_) => ErrorCode::ValidationError,
            CheckoutError::CheckoutInProgress { .. } => ErrorCode::CheckoutInProgress,
            CheckoutError::AlreadySettled { .. } => ErrorCode::AlreadySettled,
            CheckoutError::AttemptConflict { .. }
            | CheckoutError::ServiceUnavailable(ServiceError::Conflict(_)) => ErrorCode::AttemptConflict,
            CheckoutError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            CheckoutError::RollbackIncomplete { attempt_id, lines } => {
                error!(attempt_id = %attempt_id, ?lines, "Checkout left unrestored stock");
                ErrorCode::RollbackIncomplete
            }
        };
        ApiError::new(code, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_codes() {
        let err: ApiError = CartError::InvalidQuantity {
            product_id: "a".to_string(),
            quantity: -1,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidQuantity);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = CartError::CartTooLarge { max: 100 }.into();
        assert_eq!(err.code.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_checkout_error_codes() {
        let err: ApiError = CheckoutError::CheckoutInProgress {
            attempt_id: "att-1".to_string(),
        }
        .into();
        assert_eq!(err.code.status(), StatusCode::CONFLICT);

        let err: ApiError = CheckoutError::ServiceUnavailable(ServiceError::Unavailable(
            "down".to_string(),
        ))
        .into();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        assert_eq!(err.code.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = CheckoutError::AttemptConflict {
            attempt_id: "att-1".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::AttemptConflict);
        assert_eq!(err.code.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ApiError::not_found("Order", "o-1")).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Order not found: o-1");
    }
}
