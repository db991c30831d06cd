//! # Error Types
//!
//! Domain-specific error types for techshop-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  techshop-core errors (this file)                                      │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── CartError        - Local cart mutations (rejected immediately)    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  techshop-db errors        └── DbError                                 │
//! │  techshop-checkout errors  └── CheckoutError, ServiceError             │
//! │  apps/api errors           └── ApiError (what the client sees)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cart errors never leave the cart half-modified: the cart is unchanged
//! whenever one of these is returned.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product does not exist or is no longer sold.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough units to satisfy a request.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Cart Error
// =============================================================================

/// Errors raised by [`crate::cart::Cart`] mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The resulting quantity would be zero or negative.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: i64 },

    /// The resulting quantity exceeds the per-line maximum.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Adding a new line would exceed the distinct-product limit.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// The resulting quantity exceeds the stock level the client last saw.
    #[error("Only {available} of {product_id} in stock, requested {requested}")]
    ExceedsKnownStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Product id failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. control characters in an id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for cart operations.
pub type CartResult<T> = Result<T, CartError>;

// =============================================================================
// Unit Tests
// =============================================================================
