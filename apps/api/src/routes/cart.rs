//! # Cart Routes
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌──────────┐   POST items    ┌──────────┐   POST checkout  ┌─────────┐ │
//! │  │  Empty   │────────────────►│ In Cart  │─────────────────►│  Order  │ │
//! │  └──────────┘                 └──────────┘                  └─────────┘ │
//! │       ▲                        │    ▲                                   │
//! │       │       DELETE cart      │    │ PUT / DELETE items                │
//! │       └────────────────────────┘    └──────                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Carts live in memory, one per customer id. They are created by the first
//! edit and dropped again when they become empty.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use techshop_core::validation::{validate_customer_id, validate_product_id};
use techshop_core::{Cart, CartError, CartLine};

use crate::error::ApiError;
use crate::state::AppState;

/// Cart contents as returned by every cart endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub customer_id: String,
    pub items: Vec<CartLine>,
    pub total_quantity: i64,
}

impl CartResponse {
    pub fn new(customer_id: &str, cart: &Cart) -> Self {
        CartResponse {
            customer_id: customer_id.to_string(),
            items: cart.lines().to_vec(),
            total_quantity: cart.total_quantity(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

/// `GET /carts/{customer_id}`
pub async fn get_cart(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    validate_customer_id(&customer_id)?;
    let response = match state.existing_cart(&customer_id) {
        Some(cart) => CartResponse::new(&customer_id, &*cart.lock().await),
        None => CartResponse::new(&customer_id, &Cart::new()),
    };
    Ok(Json(response))
}

/// `DELETE /carts/{customer_id}`
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_customer_id(&customer_id)?;
    state.with_cart(&customer_id, Cart::clear).await;
    debug!(customer_id = %customer_id, "Cart cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /carts/{customer_id}/items`
///
/// Adds the product or increases its quantity. Quantity defaults to 1.
/// The product must exist and be active, and the resulting quantity must
/// not exceed its stock as currently known.
pub async fn add_item(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    validate_customer_id(&customer_id)?;
    validate_product_id(&request.product_id)?;

    let product = match state.catalog.get_product(&request.product_id).await? {
        Some(product) if product.is_active => product,
        _ => return Err(ApiError::not_found("Product", &request.product_id)),
    };

    let response = state
        .with_cart(&customer_id, |cart| {
            cart.add_product(&product, request.quantity.unwrap_or(1))?;
            Ok::<_, CartError>(CartResponse::new(&customer_id, cart))
        })
        .await?;

    debug!(customer_id = %customer_id, product_id = %product.id, "Item added to cart");
    Ok(Json(response))
}

/// `PUT /carts/{customer_id}/items/{product_id}`
///
/// Sets the quantity outright; 0 removes the line.
pub async fn set_quantity(
    State(state): State<AppState>,
    Path((customer_id, product_id)): Path<(String, String)>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    validate_customer_id(&customer_id)?;
    validate_product_id(&product_id)?;

    let response = state
        .with_cart(&customer_id, |cart| {
            cart.set_quantity(&product_id, request.quantity)?;
            Ok::<_, CartError>(CartResponse::new(&customer_id, cart))
        })
        .await?;

    Ok(Json(response))
}

/// `DELETE /carts/{customer_id}/items/{product_id}`
///
/// Removing a product that is not in the cart is not an error.
pub async fn remove_item(
    State(state): State<AppState>,
    Path((customer_id, product_id)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    validate_customer_id(&customer_id)?;

    let Some(shared) = state.existing_cart(&customer_id) else {
        return Ok(Json(CartResponse::new(&customer_id, &Cart::new())));
    };
    let response = {
        let mut cart = shared.lock().await;
        if cart.remove(&product_id).is_some() {
            debug!(customer_id = %customer_id, product_id = %product_id, "Item removed from cart");
        }
        CartResponse::new(&customer_id, &cart)
    };
    drop(shared);
    state.forget_if_empty(&customer_id);

    Ok(Json(response))
}
