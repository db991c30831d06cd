//! # Checkout Routes
//!
//! ```text
//! POST /carts/{customer_id}/checkout   { attemptId?, allowPartial? }
//!      └──► 200 { attemptId, outcome: { status, result } }
//!
//! POST /checkouts/{attempt_id}/cancel
//!      └──► 200 { attemptId, phase: "cancelled" }
//!      └──► 409 CHECKOUT_IN_PROGRESS | ALREADY_SETTLED
//!
//! Reusing another customer's attempt id, or a used id with a different
//! cart, is 409 ATTEMPT_CONFLICT.
//!
//! GET /orders/{id}
//! ```
//!
//! Rejected and cancelled attempts are still 200: the outcome says what
//! happened to each line.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use techshop_checkout::CheckoutPhase;
use techshop_core::validation::validate_customer_id;
use techshop_core::{CheckoutOptions, CheckoutOutcome, Order};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub attempt_id: Option<String>,
    pub allow_partial: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub attempt_id: String,
    pub outcome: CheckoutOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub attempt_id: String,
    pub phase: CheckoutPhase,
}

/// `POST /carts/{customer_id}/checkout`
///
/// The attempt is registered before the cart lock is taken, so it can be
/// cancelled while it waits for an earlier checkout of the same cart.
pub async fn checkout(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    validate_customer_id(&customer_id)?;

    let options = CheckoutOptions {
        attempt_id: request.attempt_id,
        allow_partial: request.allow_partial,
    };
    let (attempt, handle) = state.coordinator.begin(options)?;
    let attempt_id = attempt.attempt_id().to_string();
    state.track_attempt(&customer_id, handle)?;

    info!(attempt_id = %attempt_id, customer_id = %customer_id, "Checkout requested");

    let shared = state.cart(&customer_id);
    let outcome = {
        let mut cart = shared.lock().await;
        attempt.run(&mut cart, &customer_id).await
    };
    drop(shared);
    state.forget_if_empty(&customer_id);
    let outcome = outcome?;

    Ok(Json(CheckoutResponse {
        attempt_id,
        outcome,
    }))
}

/// `POST /checkouts/{attempt_id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let handle = state
        .attempt(&attempt_id)
        .ok_or_else(|| ApiError::not_found("Checkout", &attempt_id))?;

    handle.cancel()?;

    Ok(Json(CancelResponse {
        attempt_id,
        phase: handle.phase(),
    }))
}

/// `GET /orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    state
        .orders
        .get_order(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Order", &order_id))
}
