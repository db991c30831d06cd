//! # techshop-core: Pure Business Logic for TechShop
//!
//! This crate holds the cart, the reservation validator and the domain types
//! shared by the database layer, the checkout coordinator and the HTTP API.
//! Everything here is a pure function or an owned value: no database, no
//! network, no clock reads outside of constructors.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TechShop Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Mobile client (catalog, cart)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP (apps/api)                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               techshop-checkout (coordinator)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ techshop-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────────┐  ┌───────────┐     │   │
//! │  │   │  types  │  │  cart   │  │ reservation │  │  catalog  │     │   │
//! │  │   │ Product │  │  Cart   │  │  reconcile  │  │  search   │     │   │
//! │  │   │  Order  │  │CartLine │  │    plan     │  │  grouping │     │   │
//! │  │   └─────────┘  └─────────┘  └─────────────┘  └───────────┘     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Category, Order, outcomes)
//! - [`money`] - Integer-cent money type
//! - [`cart`] - Owned cart session state
//! - [`reservation`] - Cart vs. inventory snapshot reconciliation
//! - [`catalog`] - Case-insensitive search and category grouping
//! - [`validation`] - Input validation rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use techshop_core::cart::Cart;
//! use techshop_core::reservation::{reconcile, ReservationResult};
//!
//! let mut cart = Cart::new();
//! cart.add_or_increment("laptop-1", 2).unwrap();
//!
//! let snapshot = HashMap::from([("laptop-1".to_string(), 5)]);
//! let results = reconcile(cart.lines(), &snapshot);
//!
//! assert_eq!(results[0].result, ReservationResult::Satisfied(2));
//! ```

pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod reservation;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartLine};
pub use catalog::{filter_by_name, group_by_category, CategoryGroup};
pub use error::{CartError, CoreError, ValidationError};
pub use money::Money;
pub use reservation::{
    plan, reconcile, InventorySnapshot, LineReservation, ReservationPlan, ReservationResult,
    ReservedLine,
};
pub use types::*;

/// Maximum distinct products in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product in a cart.
///
/// Guards against typos like 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Name used for products whose category is unknown to the catalog.
pub const UNCATEGORIZED: &str = "Uncategorized";
