//! # Application State
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppState (cloned into every handler)                                   │
//! │                                                                         │
//! │  db           Database               health + migration status         │
//! │  catalog      Arc<dyn CatalogService>                                   │
//! │  orders       Arc<dyn OrderService>                                     │
//! │  coordinator  CheckoutCoordinator                                       │
//! │  carts        customer id ──► Arc<tokio Mutex<Cart>>                    │
//! │  attempts     attempt id  ──► (customer id, CancelHandle)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A customer's cart is locked for the whole checkout, so cart edits made
//! meanwhile wait for the outcome instead of racing it.
//!
//! Only non-empty carts are kept. Reading a cart never creates one, and a
//! cart that ends up empty is dropped once no request holds it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use techshop_checkout::{
    CancelHandle, CatalogService, CheckoutConfig, CheckoutCoordinator, CheckoutError,
    OrderService,
};
use techshop_core::Cart;
use techshop_db::Database;

/// Settled attempts are kept for cancel lookups until the registry grows
/// past this size.
const MAX_TRACKED_ATTEMPTS: usize = 1024;

pub type SharedCart = Arc<AsyncMutex<Cart>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub catalog: Arc<dyn CatalogService>,
    pub orders: Arc<dyn OrderService>,
    pub coordinator: CheckoutCoordinator,
    carts: Arc<Mutex<HashMap<String, SharedCart>>>,
    attempts: Arc<Mutex<HashMap<String, TrackedAttempt>>>,
}

struct TrackedAttempt {
    customer_id: String,
    handle: CancelHandle,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AppState {
    /// Wires the SQLite database into every port.
    pub fn new(db: Database, checkout: CheckoutConfig) -> Self {
        let shared = Arc::new(db.clone());
        AppState {
            catalog: shared.clone(),
            orders: shared.clone(),
            coordinator: CheckoutCoordinator::new(shared.clone(), shared, checkout),
            db,
            carts: Arc::new(Mutex::new(HashMap::new())),
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The customer's cart, created empty on first use.
    ///
    /// Callers that may leave it empty should drop their handle and call
    /// [`AppState::forget_if_empty`].
    pub fn cart(&self, customer_id: &str) -> SharedCart {
        lock(&self.carts)
            .entry(customer_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Cart::new())))
            .clone()
    }

    /// The customer's cart if one is kept.
    pub fn existing_cart(&self, customer_id: &str) -> Option<SharedCart> {
        lock(&self.carts).get(customer_id).cloned()
    }

    /// Runs `f` on the customer's cart, then drops the cart if it is empty.
    pub async fn with_cart<T>(&self, customer_id: &str, f: impl FnOnce(&mut Cart) -> T) -> T {
        let shared = self.cart(customer_id);
        let result = {
            let mut cart = shared.lock().await;
            f(&mut cart)
        };
        drop(shared);
        self.forget_if_empty(customer_id);
        result
    }

    /// Drops the customer's cart if it is empty and no request holds it.
    pub fn forget_if_empty(&self, customer_id: &str) {
        let mut carts = lock(&self.carts);
        let idle = carts.get(customer_id).is_some_and(|cart| {
            Arc::strong_count(cart) == 1 && cart.try_lock().is_ok_and(|cart| cart.is_empty())
        });
        if idle {
            carts.remove(customer_id);
        }
    }

    /// Number of carts currently kept in memory.
    pub fn tracked_carts(&self) -> usize {
        lock(&self.carts).len()
    }

    /// Registers a running attempt so it can be cancelled by id.
    ///
    /// Fails if an unsettled attempt with the same id is already tracked,
    /// or if the id is tracked for another customer.
    pub fn track_attempt(&self, customer_id: &str, handle: CancelHandle) -> Result<(), CheckoutError> {
        let mut attempts = lock(&self.attempts);
        let attempt_id = handle.attempt_id().to_string();

        if let Some(existing) = attempts.get(&attempt_id) {
            if existing.customer_id != customer_id {
                return Err(CheckoutError::AttemptConflict { attempt_id });
            }
            if !existing.handle.phase().is_settled() {
                return Err(CheckoutError::CheckoutInProgress { attempt_id });
            }
        }
        if attempts.len() >= MAX_TRACKED_ATTEMPTS {
            attempts.retain(|_, tracked| !tracked.handle.phase().is_settled());
        }

        attempts.insert(
            attempt_id,
            TrackedAttempt {
                customer_id: customer_id.to_string(),
                handle,
            },
        );
        Ok(())
    }

    pub fn attempt(&self, attempt_id: &str) -> Option<CancelHandle> {
        lock(&self.attempts)
            .get(attempt_id)
            .map(|tracked| tracked.handle.clone())
    }
}
