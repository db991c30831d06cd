//! # In-Memory Store
//!
//! One struct implementing all three ports over plain maps, with the same
//! per-attempt ledger semantics as the SQLite adapters. Used by tests and
//! by callers that want a coordinator without a database.
//!
//! With the `test-util` feature (always on for this crate's own tests),
//! faults can be injected per product or store-wide to drive the
//! coordinator through lost races, outages and slow calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use techshop_core::{
    new_id, Category, DecrementOutcome, InventorySnapshot, Order, OrderLine, Product, ReservedLine,
};

use crate::error::{ServiceError, ServiceResult};
use crate::ports::{CatalogService, InventoryStore, OrderService};

/// A misbehaviour attached to one product.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Another buyer takes `units` right before the next decrement. Fires once.
    LoseRace { units: i64 },
    /// Decrements fail without touching stock.
    Unavailable,
    /// Decrements apply, then the call hangs for the given time.
    SlowAfterApply(Duration),
    /// Increments fail without touching stock.
    RollbackUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    Held,
    Released,
    Committed,
}

#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
struct Faults {
    per_product: HashMap<String, Fault>,
    snapshot_delay: Option<Duration>,
    snapshot_fails: bool,
    orders_fail: bool,
}

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<String, Product>,
    categories: Vec<Category>,
    ledger: HashMap<(String, String), (i64, Hold)>,
    orders: Vec<Order>,
    decrement_calls: usize,
    #[cfg(any(test, feature = "test-util"))]
    faults: Faults,
}

impl Inner {
    fn active(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id).filter(|p| p.is_active)
    }

    fn decrement(&mut self, attempt_id: &str, product_id: &str, amount: i64) -> DecrementOutcome {
        let key = (attempt_id.to_string(), product_id.to_string());

        if let Some(&(held, hold)) = self.ledger.get(&key) {
            return match hold {
                Hold::Held | Hold::Committed if held == amount => DecrementOutcome::Applied,
                Hold::Held | Hold::Committed => DecrementOutcome::AttemptMismatch { held },
                Hold::Released => match self.active(product_id) {
                    Some(p) => DecrementOutcome::InsufficientStock {
                        available: p.unit_in_stock,
                    },
                    None => DecrementOutcome::NotFound,
                },
            };
        }

        let product = match self.products.get_mut(product_id) {
            Some(p) if p.is_active => p,
            _ => return DecrementOutcome::NotFound,
        };
        if product.unit_in_stock < amount {
            return DecrementOutcome::InsufficientStock {
                available: product.unit_in_stock,
            };
        }

        product.unit_in_stock -= amount;
        self.ledger.insert(key, (amount, Hold::Held));
        DecrementOutcome::Applied
    }

    /// Held ledger keys for every line, or the first line without a held
    /// reservation of exactly its quantity.
    fn held_keys(&self, attempt_id: &str, lines: &[ReservedLine]) -> Result<Vec<(String, String)>, String> {
        lines
            .iter()
            .map(|line| {
                let key = (attempt_id.to_string(), line.product_id.clone());
                match self.ledger.get(&key) {
                    Some(&(held, Hold::Held)) if held == line.quantity => Ok(key),
                    _ => Err(format!(
                        "attempt {} holds no reservation of {} for {}",
                        attempt_id, line.quantity, line.product_id
                    )),
                }
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Inner {
    /// Applies the product's fault ahead of a decrement. Returns how long
    /// the call should hang after applying.
    fn before_decrement(&mut self, product_id: &str) -> ServiceResult<Option<Duration>> {
        match self.faults.per_product.get(product_id).copied() {
            Some(Fault::Unavailable) => Err(ServiceError::Unavailable(format!(
                "inventory unavailable for {}",
                product_id
            ))),
            Some(Fault::LoseRace { units }) => {
                self.faults.per_product.remove(product_id);
                if let Some(p) = self.products.get_mut(product_id) {
                    p.unit_in_stock = (p.unit_in_stock - units).max(0);
                }
                Ok(None)
            }
            Some(Fault::SlowAfterApply(hang)) => Ok(Some(hang)),
            Some(Fault::RollbackUnavailable) | None => Ok(None),
        }
    }

    fn before_increment(&self, product_id: &str) -> ServiceResult<()> {
        if self.faults.per_product.get(product_id) == Some(&Fault::RollbackUnavailable) {
            return Err(ServiceError::Unavailable(format!(
                "inventory unavailable for {}",
                product_id
            )));
        }
        Ok(())
    }

    fn before_order(&self) -> ServiceResult<()> {
        if self.faults.orders_fail {
            return Err(ServiceError::Unavailable("order service unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(not(any(test, feature = "test-util")))]
impl Inner {
    fn before_decrement(&mut self, _product_id: &str) -> ServiceResult<Option<Duration>> {
        Ok(None)
    }

    fn before_increment(&self, _product_id: &str) -> ServiceResult<()> {
        Ok(())
    }

    fn before_order(&self) -> ServiceResult<()> {
        Ok(())
    }
}

/// Thread-safe in-process catalog, inventory and order book.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore::default())
    }

    /// A store holding one active product per `(id, stock)` pair, priced at $10.00.
    pub fn with_stock(stock: &[(&str, i64)]) -> Arc<Self> {
        let store = MemoryStore::new();
        for (id, units) in stock {
            store.insert_product(product(id, 1000, *units));
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_product(&self, product: Product) {
        self.lock().products.insert(product.id.clone(), product);
    }

    pub fn insert_category(&self, category: Category) {
        self.lock().categories.push(category);
    }

    /// Current stock of a product, active or not.
    pub fn stock(&self, product_id: &str) -> Option<i64> {
        self.lock().products.get(product_id).map(|p| p.unit_in_stock)
    }

    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    /// Number of decrement calls received, including failed ones.
    pub fn decrement_calls(&self) -> usize {
        self.lock().decrement_calls
    }
}

// =============================================================================
// Fault Injection
// =============================================================================

#[cfg(any(test, feature = "test-util"))]
impl MemoryStore {
    pub fn inject(&self, product_id: &str, fault: Fault) {
        self.lock().faults.per_product.insert(product_id.to_string(), fault);
    }

    pub fn delay_snapshots(&self, delay: Duration) {
        self.lock().faults.snapshot_delay = Some(delay);
    }

    pub fn fail_snapshots(&self) {
        self.lock().faults.snapshot_fails = true;
    }

    pub fn fail_orders(&self) {
        self.lock().faults.orders_fail = true;
    }
}

fn product(id: &str, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        name: id.to_string(),
        description: None,
        brand: "TechShop".to_string(),
        price_cents,
        unit_in_stock: stock,
        category_id: None,
        image_url: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Ports
// =============================================================================

#[async_trait]
impl CatalogService for MemoryStore {
    async fn get_product(&self, product_id: &str) -> ServiceResult<Option<Product>> {
        Ok(self.lock().products.get(product_id).cloned())
    }

    async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .lock()
            .products
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.lock().categories.clone())
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn snapshot(&self, product_ids: &[String]) -> ServiceResult<InventorySnapshot> {
        #[cfg(any(test, feature = "test-util"))]
        {
            let delay = self.lock().faults.snapshot_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.lock().faults.snapshot_fails {
                return Err(ServiceError::Unavailable("inventory snapshot failed".to_string()));
            }
        }

        let inner = self.lock();
        Ok(product_ids
            .iter()
            .filter_map(|id| inner.active(id).map(|p| (id.clone(), p.unit_in_stock)))
            .collect())
    }

    async fn conditional_decrement(
        &self,
        attempt_id: &str,
        product_id: &str,
        amount: i64,
    ) -> ServiceResult<DecrementOutcome> {
        let (outcome, hang) = {
            let mut inner = self.lock();
            inner.decrement_calls += 1;
            let hang = inner.before_decrement(product_id)?;
            (inner.decrement(attempt_id, product_id, amount), hang)
        };

        if let Some(hang) = hang {
            tokio::time::sleep(hang).await;
        }
        Ok(outcome)
    }

    async fn increment(&self, attempt_id: &str, product_id: &str, _amount: i64) -> ServiceResult<()> {
        let mut inner = self.lock();
        inner.before_increment(product_id)?;

        let key = (attempt_id.to_string(), product_id.to_string());
        let quantity = match inner.ledger.get_mut(&key) {
            Some((quantity, hold)) if *hold == Hold::Held => {
                *hold = Hold::Released;
                *quantity
            }
            _ => return Ok(()),
        };
        if let Some(p) = inner.products.get_mut(product_id) {
            p.unit_in_stock += quantity;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderService for MemoryStore {
    async fn create_order(
        &self,
        attempt_id: &str,
        customer_id: &str,
        lines: &[ReservedLine],
    ) -> ServiceResult<Order> {
        let mut inner = self.lock();
        inner.before_order()?;

        if let Some(existing) = inner.orders.iter().find(|o| o.attempt_id == attempt_id) {
            if existing.matches_request(customer_id, lines) {
                return Ok(existing.clone());
            }
            return Err(ServiceError::Conflict(format!(
                "attempt {} already has a different order",
                attempt_id
            )));
        }
        if lines.is_empty() {
            return Err(ServiceError::Rejected("order has no lines".to_string()));
        }

        let mut order_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let product = inner.products.get(&line.product_id).ok_or_else(|| {
                ServiceError::Rejected(format!("Product not found: {}", line.product_id))
            })?;
            order_lines.push(OrderLine::snapshot(product, line.quantity));
        }
        let held = inner.held_keys(attempt_id, lines).map_err(ServiceError::Conflict)?;
        for key in held {
            if let Some((_, hold)) = inner.ledger.get_mut(&key) {
                *hold = Hold::Committed;
            }
        }

        let order = Order {
            id: new_id(),
            attempt_id: attempt_id.to_string(),
            customer_id: customer_id.to_string(),
            total_cents: order_lines.iter().map(|l| l.line_total_cents).sum(),
            lines: order_lines,
            created_at: Utc::now(),
        };
        inner.orders.push(order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: &str) -> ServiceResult<Option<Order>> {
        Ok(self.lock().orders.iter().find(|o| o.id == order_id).cloned())
    }
}
