//! # Ports
//!
//! The coordinator's collaborators. Production wires them to
//! [`techshop_db::Database`] (see `adapters`); tests use the in-process
//! [`MemoryStore`](crate::memory::MemoryStore).

use async_trait::async_trait;

use techshop_core::{Category, DecrementOutcome, InventorySnapshot, Order, Product, ReservedLine};

use crate::error::ServiceResult;

/// Read access to the catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// A product by id, `None` if it does not exist.
    async fn get_product(&self, product_id: &str) -> ServiceResult<Option<Product>>;

    /// Active products.
    async fn list_products(&self) -> ServiceResult<Vec<Product>>;

    async fn list_categories(&self) -> ServiceResult<Vec<Category>>;
}

/// The authoritative stock counts.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Current stock for the given products in one call. Unknown products
    /// are absent from the map.
    async fn snapshot(&self, product_ids: &[String]) -> ServiceResult<InventorySnapshot>;

    /// Atomically takes `amount` units only if at least that many remain.
    ///
    /// Keyed by `attempt_id`: repeating the call for the same attempt and
    /// product never takes stock twice.
    async fn conditional_decrement(
        &self,
        attempt_id: &str,
        product_id: &str,
        amount: i64,
    ) -> ServiceResult<DecrementOutcome>;

    /// Gives back what `attempt_id` took for `product_id`.
    ///
    /// Restores stock at most once per (attempt, product), and only if the
    /// decrement actually landed.
    async fn increment(&self, attempt_id: &str, product_id: &str, amount: i64) -> ServiceResult<()>;
}

/// Order persistence.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Creates the order for an attempt's reserved lines.
    async fn create_order(
        &self,
        attempt_id: &str,
        customer_id: &str,
        lines: &[ReservedLine],
    ) -> ServiceResult<Order>;

    async fn get_order(&self, order_id: &str) -> ServiceResult<Option<Order>>;
}
