//! # Cart State
//!
//! The customer's shopping cart: an ordered list of (product, quantity)
//! lines held entirely in memory until checkout.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Client Action            Cart Method              State Change         │
//! │  ─────────────            ───────────              ────────────         │
//! │                                                                         │
//! │  Tap "Add to cart" ──────► add_product() ─────────► push / qty += n     │
//! │                                                                         │
//! │  Change quantity ────────► set_quantity() ────────► qty = n (0 removes) │
//! │                                                                         │
//! │  Swipe to remove ────────► remove() ──────────────► line dropped        │
//! │                                                                         │
//! │  Checkout ───────────────► lines() ───────────────► (read only)         │
//! │        │                                                                │
//! │        ├── Committed ────► clear()                                      │
//! │        └── Partial ──────► deduct() per purchased line                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `product_id`; insertion order is display order
//! - Every line has `1 <= quantity <= MAX_ITEM_QUANTITY`
//! - At most `MAX_CART_ITEMS` distinct lines
//! - A failed mutation leaves the cart unchanged
//!
//! The cart never talks to inventory. `last_known_stock` is whatever the
//! client saw when the line was added and may be stale by checkout time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CartError, CartResult};
use crate::types::Product;
use crate::validation::validate_product_id;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    /// Weak reference to a product; the product may since have disappeared.
    pub product_id: String,

    pub quantity: i64,

    /// Stock level the client last saw for this product.
    pub last_known_stock: Option<i64>,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn new(product_id: &str, quantity: i64, last_known_stock: Option<i64>) -> Self {
        CartLine {
            product_id: product_id.to_string(),
            quantity,
            last_known_stock,
            added_at: Utc::now(),
        }
    }
}

/// The shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,

    /// When the cart was created or last cleared.
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds `quantity` of a product, or increments the existing line.
    ///
    /// ## Errors
    /// - `InvalidQuantity` if the resulting quantity is zero or negative
    /// - `QuantityTooLarge` if it exceeds `MAX_ITEM_QUANTITY`
    /// - `CartTooLarge` if a new line would exceed `MAX_CART_ITEMS`
    ///
    /// ```rust
    /// use techshop_core::cart::Cart;
    ///
    /// let mut cart = Cart::new();
    /// cart.add_or_increment("a", 2).unwrap();
    /// cart.add_or_increment("a", 1).unwrap();
    /// assert_eq!(cart.get("a").unwrap().quantity, 3);
    ///
    /// assert!(cart.add_or_increment("a", -3).is_err());
    /// assert_eq!(cart.get("a").unwrap().quantity, 3);
    /// ```
    pub fn add_or_increment(&mut self, product_id: &str, quantity: i64) -> CartResult<()> {
        validate_product_id(product_id)?;
        let new_qty = self.checked_increment(product_id, quantity)?;

        match self.position(product_id) {
            Some(i) => self.lines[i].quantity = new_qty,
            None => self.lines.push(CartLine::new(product_id, new_qty, None)),
        }
        Ok(())
    }

    /// Like [`Cart::add_or_increment`], checked against the product's
    /// current stock, which becomes the line's `last_known_stock`.
    ///
    /// ## Errors
    /// Everything `add_or_increment` returns, plus `ExceedsKnownStock` when
    /// the resulting quantity is more than `product.unit_in_stock`.
    pub fn add_product(&mut self, product: &Product, quantity: i64) -> CartResult<()> {
        validate_product_id(&product.id)?;
        let new_qty = self.checked_increment(&product.id, quantity)?;

        if new_qty > product.unit_in_stock {
            return Err(CartError::ExceedsKnownStock {
                product_id: product.id.clone(),
                available: product.unit_in_stock,
                requested: new_qty,
            });
        }

        let stock = Some(product.unit_in_stock);
        match self.position(&product.id) {
            Some(i) => {
                let line = &mut self.lines[i];
                line.quantity = new_qty;
                line.last_known_stock = stock;
            }
            None => self.lines.push(CartLine::new(&product.id, new_qty, stock)),
        }
        Ok(())
    }

    /// Sets a line's quantity directly.
    ///
    /// - `0` removes the line
    /// - negative fails with `InvalidQuantity`
    /// - an absent product with a positive quantity is appended
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> CartResult<()> {
        validate_product_id(product_id)?;

        if quantity < 0 {
            return Err(CartError::InvalidQuantity {
                product_id: product_id.to_string(),
                quantity,
            });
        }

        if quantity == 0 {
            self.remove(product_id);
            return Ok(());
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CartError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        match self.position(product_id) {
            Some(i) => self.lines[i].quantity = quantity,
            None => {
                self.ensure_room()?;
                self.lines.push(CartLine::new(product_id, quantity, None));
            }
        }
        Ok(())
    }

    /// Removes a line. Returns the removed line, `None` if it was absent.
    pub fn remove(&mut self, product_id: &str) -> Option<CartLine> {
        self.position(product_id).map(|i| self.lines.remove(i))
    }

    /// Removes `quantity` purchased units from a line, dropping the line
    /// once nothing is left.
    pub fn deduct(&mut self, product_id: &str, quantity: i64) {
        if let Some(i) = self.position(product_id) {
            let remaining = self.lines[i].quantity - quantity;
            if remaining <= 0 {
                self.lines.remove(i);
            } else {
                self.lines[i].quantity = remaining;
            }
        }
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.created_at = Utc::now();
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn get(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Product ids in insertion order.
    pub fn product_ids(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.product_id.clone()).collect()
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all line quantities.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn position(&self, product_id: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id == product_id)
    }

    fn ensure_room(&self) -> CartResult<()> {
        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CartError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }
        Ok(())
    }

    /// Quantity the line would have after adding `quantity`, without
    /// touching the cart.
    fn checked_increment(&self, product_id: &str, quantity: i64) -> CartResult<i64> {
        let existing = self.get(product_id).map(|l| l.quantity);
        let new_qty = existing.unwrap_or(0).saturating_add(quantity);

        if new_qty <= 0 {
            return Err(CartError::InvalidQuantity {
                product_id: product_id.to_string(),
                quantity: new_qty,
            });
        }

        if new_qty > MAX_ITEM_QUANTITY {
            return Err(CartError::QuantityTooLarge {
                requested: new_qty,
                max: MAX_ITEM_QUANTITY,
            });
        }

        if existing.is_none() {
            self.ensure_room()?;
        }

        Ok(new_qty)
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            description: None,
            brand: "Acme".to_string(),
            price_cents: 999,
            unit_in_stock: stock,
            category_id: None,
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_or_increment_merges_lines() {
        let mut cart = Cart::new();
        cart.add_or_increment("a", 2).unwrap();
        cart.add_or_increment("b", 1).unwrap();
        cart.add_or_increment("a", 3).unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.get("a").unwrap().quantity, 5);
        assert_eq!(cart.product_ids(), vec!["a", "b"]);
        assert_eq!(cart.total_quantity(), 6);
    }

    #[test]
    fn test_add_or_increment_rejects_non_positive_result() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add_or_increment("a", 0),
            Err(CartError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(cart.is_empty());

        cart.add_or_increment("a", 2).unwrap();
        let before = cart.clone();
        assert!(matches!(
            cart.add_or_increment("a", -5),
            Err(CartError::InvalidQuantity { quantity: -3, .. })
        ));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_negative_increment_that_stays_positive_is_allowed() {
        let mut cart = Cart::new();
        cart.add_or_increment("a", 5).unwrap();
        cart.add_or_increment("a", -2).unwrap();
        assert_eq!(cart.get("a").unwrap().quantity, 3);
    }

    #[test]
    fn test_quantity_and_size_limits() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add_or_increment("a", MAX_ITEM_QUANTITY + 1),
            Err(CartError::QuantityTooLarge { .. })
        ));

        for i in 0..MAX_CART_ITEMS {
            cart.add_or_increment(&format!("p{}", i), 1).unwrap();
        }
        assert!(matches!(
            cart.add_or_increment("one-too-many", 1),
            Err(CartError::CartTooLarge { max: MAX_CART_ITEMS })
        ));
        assert!(matches!(
            cart.set_quantity("one-too-many", 1),
            Err(CartError::CartTooLarge { .. })
        ));
        // Existing lines can still grow.
        cart.add_or_increment("p0", 1).unwrap();
        assert_eq!(cart.len(), MAX_CART_ITEMS);
    }

    #[test]
    fn test_add_product_checks_known_stock() {
        let mut cart = Cart::new();
        let phone = product("phone", 3);

        cart.add_product(&phone, 2).unwrap();
        assert_eq!(cart.get("phone").unwrap().last_known_stock, Some(3));

        let err = cart.add_product(&phone, 2).unwrap_err();
        assert_eq!(
            err,
            CartError::ExceedsKnownStock {
                product_id: "phone".to_string(),
                available: 3,
                requested: 4,
            }
        );
        assert_eq!(cart.get("phone").unwrap().quantity, 2);
    }

    #[test]
    fn test_set_quantity() {
        let mut cart = Cart::new();
        cart.add_or_increment("a", 2).unwrap();

        cart.set_quantity("a", 7).unwrap();
        assert_eq!(cart.get("a").unwrap().quantity, 7);

        cart.set_quantity("b", 1).unwrap();
        assert_eq!(cart.product_ids(), vec!["a", "b"]);

        assert!(matches!(
            cart.set_quantity("a", -1),
            Err(CartError::InvalidQuantity { .. })
        ));

        cart.set_quantity("a", 0).unwrap();
        assert!(cart.get("a").is_none());

        // Zero on an absent product is a no-op.
        cart.set_quantity("zzz", 0).unwrap();
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut cart = Cart::new();
        cart.add_or_increment("a", 1).unwrap();
        assert!(cart.remove("missing").is_none());
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.remove("a").unwrap().quantity, 1);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_deduct_keeps_remainder() {
        let mut cart = Cart::new();
        cart.add_or_increment("a", 3).unwrap();
        cart.add_or_increment("b", 1).unwrap();

        cart.deduct("a", 1);
        cart.deduct("b", 1);
        cart.deduct("missing", 4);

        assert_eq!(cart.get("a").unwrap().quantity, 2);
        assert!(cart.get("b").is_none());
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add_or_increment("a", 1).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_rejects_invalid_product_id() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add_or_increment("", 1),
            Err(CartError::Validation(_))
        ));
    }
}
