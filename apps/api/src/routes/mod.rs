//! # Routes
//!
//! ```text
//! GET    /health
//! GET    /categories
//! GET    /products?search=&category=
//! GET    /products/{id}
//! GET    /catalog?search=
//! GET    /carts/{customer_id}
//! DELETE /carts/{customer_id}
//! POST   /carts/{customer_id}/items
//! PUT    /carts/{customer_id}/items/{product_id}
//! DELETE /carts/{customer_id}/items/{product_id}
//! POST   /carts/{customer_id}/checkout
//! POST   /checkouts/{attempt_id}/cancel
//! GET    /orders/{id}
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(catalog::health))
        .route("/categories", get(catalog::list_categories))
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/catalog", get(catalog::grouped))
        .route("/carts/{customer_id}", get(cart::get_cart).delete(cart::clear_cart))
        .route("/carts/{customer_id}/items", post(cart::add_item))
        .route(
            "/carts/{customer_id}/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove_item),
        )
        .route("/carts/{customer_id}/checkout", post(checkout::checkout))
        .route("/checkouts/{attempt_id}/cancel", post(checkout::cancel))
        .route("/orders/{id}", get(checkout::get_order))
        .with_state(state)
}
