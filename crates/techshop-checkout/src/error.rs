//! # Checkout Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per-line problems (out of stock, lost race, unknown product)           │
//! │      └──► aggregated into CheckoutOutcome, never an Err                 │
//! │                                                                         │
//! │  Request problems (empty cart, bad ids, reused attempt id)              │
//! │      └──► CheckoutError::EmptyCart / Validation / AttemptConflict       │
//! │                                                                         │
//! │  Collaborator failures                                                  │
//! │      └──► ServiceError ──► CheckoutError::ServiceUnavailable            │
//! │                                                                         │
//! │  Compensation failures                                                  │
//! │      └──► CheckoutError::RollbackIncomplete { attempt_id, lines }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use thiserror::Error;

use techshop_core::{ReservedLine, ValidationError};
use techshop_db::DbError;

/// A collaborator (catalog, inventory store, order service) failed.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The collaborator could not be reached or failed internally.
    #[error("{0}")]
    Unavailable(String),

    /// The collaborator refused the request (constraint, bad input).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The request contradicts what the store already recorded for the
    /// attempt id.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No answer within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { .. } | DbError::ReservationMismatch { .. } => {
                ServiceError::Conflict(err.to_string())
            }
            DbError::Validation(_)
            | DbError::NotFound { .. }
            | DbError::ForeignKeyViolation { .. }
            | DbError::CheckViolation { .. } => ServiceError::Rejected(err.to_string()),
            _ => ServiceError::Unavailable(err.to_string()),
        }
    }
}

/// Result type for port calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by the checkout coordinator.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to check out.
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid checkout request: {0}")]
    Validation(#[from] ValidationError),

    /// Cancel was requested after inventory started changing.
    #[error("Checkout {attempt_id} is already reserving inventory")]
    CheckoutInProgress { attempt_id: String },

    /// Cancel was requested after the attempt finished.
    #[error("Checkout {attempt_id} has already finished")]
    AlreadySettled { attempt_id: String },

    /// The attempt id was already used for a different customer or cart.
    /// Inventory is as it was before this call.
    #[error("Checkout {attempt_id} was already used for a different request")]
    AttemptConflict { attempt_id: String },

    /// A collaborator failed; the attempt left inventory unchanged.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(#[from] ServiceError),

    /// Some applied decrements could not be undone and need reconciliation.
    #[error("Rollback incomplete for attempt {attempt_id}: {} line(s) not restored", lines.len())]
    RollbackIncomplete {
        attempt_id: String,
        lines: Vec<ReservedLine>,
    },
}

/// Result type for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
