//! # Domain Types
//!
//! Core domain types used throughout TechShop.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │   │    Product      │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  category_id    │   │  id (UUID)      │       │
//! │  │  name           │   │  price_cents    │   │  attempt_id     │       │
//! │  │  description    │   │  unit_in_stock  │   │  lines[]        │       │
//! │  └─────────────────┘   └─────────────────┘   │  total_cents    │       │
//! │                                              └─────────────────┘       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │ CheckoutOutcome                                                  │   │
//! │  │   Committed(Order)                                               │   │
//! │  │   Rejected(Vec<LineRejection>)                                   │   │
//! │  │   PartiallyCommitted { order, failed_lines }                     │   │
//! │  │   Cancelled                                                      │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Product ids are opaque strings. Orders copy the product name, brand and
//! price at checkout time so later catalog edits never change a placed order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::reservation::ReservedLine;

// =============================================================================
// Category
// =============================================================================

/// A product category ("Laptops", "Phones").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,

    /// Display name. Required.
    pub name: String,

    pub description: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// `unit_in_stock` is the authoritative inventory count. Only the inventory
/// repository changes it, through a conditional decrement or a restock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Opaque identifier.
    pub id: String,

    /// Display name, matched by catalog search.
    pub name: String,

    pub description: Option<String>,

    pub brand: String,

    /// Price in cents, never negative.
    pub price_cents: i64,

    /// Units available for sale, never negative.
    pub unit_in_stock: i64,

    /// Category this product is listed under.
    pub category_id: Option<String>,

    pub image_url: Option<String>,

    /// Inactive products are hidden from the catalog and cannot be bought.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether the product currently has at least `quantity` units.
    ///
    /// Advisory only: the value may already be stale when it is read.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.unit_in_stock >= quantity
    }
}

// =============================================================================
// Order
// =============================================================================

/// One purchased line, with product data frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub brand: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

impl OrderLine {
    /// Builds a line from the product as it is right now.
    pub fn snapshot(product: &Product, quantity: i64) -> Self {
        OrderLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            brand: product.brand.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            line_total_cents: product.price().multiply_quantity(quantity).cents(),
        }
    }
}

/// A placed order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,

    /// The checkout attempt that produced this order.
    pub attempt_id: String,

    pub customer_id: String,

    pub lines: Vec<OrderLine>,

    pub total_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Quantity ordered for a product, 0 if absent.
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    /// True if this order is exactly what `customer_id` asked for with
    /// `lines`, in the same order.
    pub fn matches_request(&self, customer_id: &str, lines: &[ReservedLine]) -> bool {
        self.customer_id == customer_id
            && self.lines.len() == lines.len()
            && self
                .lines
                .iter()
                .zip(lines)
                .all(|(ordered, reserved)| {
                    ordered.product_id == reserved.product_id && ordered.quantity == reserved.quantity
                })
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Result of an atomic "decrement only if enough stock" operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecrementOutcome {
    /// The units were taken (or had already been taken by this attempt).
    Applied,
    /// Fewer than the requested units were left; nothing changed.
    InsufficientStock { available: i64 },
    /// No active product with that id.
    NotFound,
    /// The attempt already holds a different quantity of this product.
    /// Nothing changed.
    AttemptMismatch { held: i64 },
}

// =============================================================================
// Checkout Outcome
// =============================================================================

/// Why a cart line could not be (fully) purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The product does not exist or is no longer sold.
    NotFound,
    /// The snapshot showed fewer units than requested (possibly zero).
    OutOfStock,
    /// The snapshot looked fine but the conditional decrement lost a race.
    InsufficientStock,
    /// The store did not answer for this line in time or failed.
    ServiceUnavailable,
}

/// A cart line that did not make it into the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRejection {
    pub product_id: String,

    /// Quantity the cart asked for.
    pub requested: i64,

    /// Units the inventory reported, when known.
    pub available: Option<i64>,

    pub reason: RejectionReason,
}

impl LineRejection {
    pub fn new(
        product_id: impl Into<String>,
        requested: i64,
        available: Option<i64>,
        reason: RejectionReason,
    ) -> Self {
        LineRejection {
            product_id: product_id.into(),
            requested,
            available,
            reason,
        }
    }
}

/// Result of a checkout attempt.
///
/// Per-line problems are reported here rather than as errors. Only
/// collaborator failures surface as `Err` from the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Every line was purchased in full.
    Committed(Order),

    /// Nothing was purchased. Inventory is exactly as before the attempt.
    Rejected(Vec<LineRejection>),

    /// Some lines were purchased, the rest are listed in `failed_lines`.
    PartiallyCommitted {
        order: Order,
        failed_lines: Vec<LineRejection>,
    },

    /// The attempt was cancelled before any inventory was touched.
    Cancelled,
}

impl CheckoutOutcome {
    /// The order placed by this attempt, if any.
    pub fn order(&self) -> Option<&Order> {
        match self {
            CheckoutOutcome::Committed(order) => Some(order),
            CheckoutOutcome::PartiallyCommitted { order, .. } => Some(order),
            _ => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, CheckoutOutcome::Committed(_))
    }
}

/// Per-attempt checkout options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutOptions {
    /// Client-supplied attempt id. Generated when absent.
    pub attempt_id: Option<String>,

    /// Buy what is available instead of rejecting the whole cart.
    /// `None` uses the service default.
    pub allow_partial: Option<bool>,
}

// =============================================================================
// Unit Tests
// =============================================================================
