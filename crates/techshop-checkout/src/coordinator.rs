//! # Checkout Coordinator
//!
//! Turns a cart into an order without ever selling more units than exist.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Validating                                                          │
//! │     snapshot(all cart product ids)       ── one batched read, bounded   │
//! │     reconcile + plan                     ── pure, techshop-core         │
//! │     rejections and all-or-nothing?       ──► Rejected (nothing touched) │
//! │                                                                         │
//! │  2. Reserving (cannot be cancelled from here on)                        │
//! │     for each planned line, in cart order:                               │
//! │         conditional_decrement(attempt, product, qty)   ── bounded       │
//! │         Applied              ──► keep going                             │
//! │         Insufficient/NotFound/timeout/error ──► failed line             │
//! │         AttemptMismatch      ──► roll back, Err(AttemptConflict)        │
//! │                                                                         │
//! │  3. Settling                                                            │
//! │     all-or-nothing + any failure ──► increment() every applied line     │
//! │                                      ──► Rejected(failed lines)         │
//! │     otherwise ──► create_order(applied)                                 │
//! │                    ├── ok   ──► Committed / PartiallyCommitted          │
//! │                    ├── conflict ──► roll back, Err(AttemptConflict)     │
//! │                    └── err  ──► roll back everything, Err               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional decrement is the only oversell guard. The snapshot is
//! used to reject early and to size partial purchases, never to decide that
//! stock is available.
//!
//! A decrement that timed out or errored may still have landed in the
//! store. Such lines are rolled back like applied ones; the store's
//! per-attempt ledger restores them only if they actually landed.
//!
//! Resubmitting an attempt id replays it: the same customer with the same
//! cart gets the same order back. A different cart or customer under a used
//! id is refused with [`CheckoutError::AttemptConflict`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use techshop_core::validation::{validate_attempt_id, validate_customer_id};
use techshop_core::{
    new_id, plan, reconcile, Cart, CheckoutOptions, CheckoutOutcome, DecrementOutcome,
    LineRejection, RejectionReason, ReservedLine,
};

use crate::attempt::{AttemptShared, CancelHandle, CheckoutPhase};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult, ServiceError};
use crate::ports::{InventoryStore, OrderService};

// =============================================================================
// Coordinator
// =============================================================================

/// Runs checkout attempts against an inventory store and an order service.
///
/// Cheap to clone. Attempts are independent of each other; any number may
/// run concurrently.
#[derive(Clone)]
pub struct CheckoutCoordinator {
    inventory: Arc<dyn InventoryStore>,
    orders: Arc<dyn OrderService>,
    config: CheckoutConfig,
}

impl CheckoutCoordinator {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        orders: Arc<dyn OrderService>,
        config: CheckoutConfig,
    ) -> Self {
        CheckoutCoordinator {
            inventory,
            orders,
            config,
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Prepares an attempt without running it.
    ///
    /// The returned [`CancelHandle`] can be handed to another task before
    /// [`CheckoutAttempt::run`] is awaited.
    pub fn begin(&self, options: CheckoutOptions) -> CheckoutResult<(CheckoutAttempt, CancelHandle)> {
        let attempt_id = match options.attempt_id {
            Some(id) => {
                validate_attempt_id(&id)?;
                id
            }
            None => new_id(),
        };
        let allow_partial = options.allow_partial.unwrap_or(self.config.allow_partial);

        let shared = AttemptShared::new();
        let handle = CancelHandle::new(attempt_id.clone(), shared.clone());
        let attempt = CheckoutAttempt {
            attempt_id,
            allow_partial,
            shared,
            coordinator: self.clone(),
        };

        Ok((attempt, handle))
    }

    /// Begins and runs an attempt in one call.
    pub async fn checkout(
        &self,
        cart: &mut Cart,
        customer_id: &str,
        options: CheckoutOptions,
    ) -> CheckoutResult<CheckoutOutcome> {
        let (attempt, _handle) = self.begin(options)?;
        attempt.run(cart, customer_id).await
    }
}

// =============================================================================
// Attempt
// =============================================================================

/// One checkout attempt, created by [`CheckoutCoordinator::begin`].
pub struct CheckoutAttempt {
    attempt_id: String,
    allow_partial: bool,
    shared: Arc<AttemptShared>,
    coordinator: CheckoutCoordinator,
}

impl CheckoutAttempt {
    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn allow_partial(&self) -> bool {
        self.allow_partial
    }

    /// Runs the attempt to completion.
    ///
    /// The cart is cleared on `Committed`, reduced by the purchased
    /// quantities on `PartiallyCommitted`, and left as it was otherwise.
    pub async fn run(self, cart: &mut Cart, customer_id: &str) -> CheckoutResult<CheckoutOutcome> {
        let result = self.execute(cart, customer_id).await;

        match &result {
            Ok(CheckoutOutcome::Committed(_)) => self.shared.settle(CheckoutPhase::Committed),
            Ok(CheckoutOutcome::PartiallyCommitted { .. }) => {
                self.shared.settle(CheckoutPhase::PartiallyCommitted)
            }
            Ok(CheckoutOutcome::Rejected(_)) => self.shared.settle(CheckoutPhase::Rejected),
            Ok(CheckoutOutcome::Cancelled) => self.shared.settle(CheckoutPhase::Cancelled),
            Err(_) => self.shared.settle(CheckoutPhase::Failed),
        }

        result
    }

    async fn execute(&self, cart: &mut Cart, customer_id: &str) -> CheckoutResult<CheckoutOutcome> {
        validate_customer_id(customer_id)?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let attempt_id = self.attempt_id.as_str();
        let config = &self.coordinator.config;
        let inventory = &self.coordinator.inventory;

        // ---------------------------------------------------------------------
        // Validating
        // ---------------------------------------------------------------------
        if !self.shared.advance(CheckoutPhase::Idle, CheckoutPhase::Validating) {
            return Ok(CheckoutOutcome::Cancelled);
        }

        debug!(attempt_id, customer_id, lines = cart.len(), "Checkout validating");

        let product_ids = cart.product_ids();
        let mut cancelled = self.shared.subscribe();

        let snapshot = tokio::select! {
            biased;
            _ = cancellation(&mut cancelled) => {
                info!(attempt_id, "Checkout cancelled during validation");
                return Ok(CheckoutOutcome::Cancelled);
            }
            read = timeout(config.snapshot_timeout, inventory.snapshot(&product_ids)) => match read {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(e)) => {
                    error!(attempt_id, error = %e, "Inventory snapshot failed");
                    return Err(e.into());
                }
                Err(_) => {
                    error!(attempt_id, "Inventory snapshot timed out");
                    return Err(ServiceError::Timeout {
                        operation: "inventory snapshot",
                        after: config.snapshot_timeout,
                    }
                    .into());
                }
            }
        };

        let reservations = reconcile(cart.lines(), &snapshot);
        let plan = plan(&reservations, self.allow_partial);

        if !self.allow_partial && !plan.is_fully_satisfied() {
            info!(attempt_id, rejected = plan.rejections.len(), "Checkout rejected at validation");
            return Ok(CheckoutOutcome::Rejected(plan.rejections));
        }
        if plan.is_empty() {
            info!(attempt_id, "Nothing available to reserve");
            return Ok(CheckoutOutcome::Rejected(plan.rejections));
        }

        // ---------------------------------------------------------------------
        // Reserving
        // ---------------------------------------------------------------------
        if !self.shared.advance(CheckoutPhase::Validating, CheckoutPhase::Reserving) {
            return Ok(CheckoutOutcome::Cancelled);
        }

        let requested: HashMap<&str, i64> = reservations
            .iter()
            .map(|r| (r.product_id.as_str(), r.requested))
            .collect();

        let mut applied: Vec<ReservedLine> = Vec::new();
        let mut uncertain: Vec<ReservedLine> = Vec::new();
        let mut failed: Vec<LineRejection> = plan.rejections;
        let mut conflict = false;

        for line in plan.to_reserve {
            let product_id = line.product_id.as_str();
            let asked = requested.get(product_id).copied().unwrap_or(line.quantity);

            let rejection = match timeout(
                config.decrement_timeout,
                inventory.conditional_decrement(attempt_id, product_id, line.quantity),
            )
            .await
            {
                Ok(Ok(DecrementOutcome::Applied)) => {
                    debug!(attempt_id, product_id, quantity = line.quantity, "Line reserved");
                    applied.push(line);
                    continue;
                }
                Ok(Ok(DecrementOutcome::InsufficientStock { available })) => {
                    warn!(attempt_id, product_id, available, "Lost race for stock");
                    LineRejection::new(product_id, asked, Some(available), RejectionReason::InsufficientStock)
                }
                Ok(Ok(DecrementOutcome::NotFound)) => {
                    warn!(attempt_id, product_id, "Product vanished before decrement");
                    LineRejection::new(product_id, asked, None, RejectionReason::NotFound)
                }
                Ok(Ok(DecrementOutcome::AttemptMismatch { held })) => {
                    warn!(
                        attempt_id,
                        product_id,
                        held,
                        quantity = line.quantity,
                        "Attempt id reused with a different quantity"
                    );
                    conflict = true;
                    break;
                }
                Ok(Err(e)) => {
                    error!(attempt_id, product_id, error = %e, "Decrement failed");
                    let rejection =
                        LineRejection::new(product_id, asked, None, RejectionReason::ServiceUnavailable);
                    uncertain.push(line);
                    rejection
                }
                Err(_) => {
                    error!(attempt_id, product_id, "Decrement timed out");
                    let rejection =
                        LineRejection::new(product_id, asked, None, RejectionReason::ServiceUnavailable);
                    uncertain.push(line);
                    rejection
                }
            };

            failed.retain(|f| f.product_id != rejection.product_id);
            failed.push(rejection);

            if !self.allow_partial {
                break;
            }
        }

        // ---------------------------------------------------------------------
        // Settling
        // ---------------------------------------------------------------------
        if conflict {
            let mut to_restore = applied;
            to_restore.extend(uncertain);
            let unrestored = self.rollback(&to_restore).await;
            if !unrestored.is_empty() {
                return Err(self.incomplete(unrestored));
            }
            return Err(self.conflict());
        }

        if !self.allow_partial && !failed.is_empty() {
            warn!(attempt_id, applied = applied.len(), "Rolling back checkout");
            let mut to_restore = applied;
            to_restore.extend(uncertain);
            let unrestored = self.rollback(&to_restore).await;
            if !unrestored.is_empty() {
                return Err(self.incomplete(unrestored));
            }
            return Ok(CheckoutOutcome::Rejected(failed));
        }

        if !uncertain.is_empty() {
            let mut unrestored = self.rollback(&uncertain).await;
            if !unrestored.is_empty() {
                unrestored.extend(self.rollback(&applied).await);
                return Err(self.incomplete(unrestored));
            }
        }

        if applied.is_empty() {
            info!(attempt_id, "No line could be reserved");
            return Ok(CheckoutOutcome::Rejected(failed));
        }

        let order = match self
            .coordinator
            .orders
            .create_order(attempt_id, customer_id, &applied)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                error!(attempt_id, error = %e, "Order creation failed, rolling back");
                let unrestored = self.rollback(&applied).await;
                if !unrestored.is_empty() {
                    return Err(self.incomplete(unrestored));
                }
                return Err(match e {
                    ServiceError::Conflict(_) => self.conflict(),
                    e => e.into(),
                });
            }
        };

        if self.allow_partial {
            for line in &applied {
                cart.deduct(&line.product_id, line.quantity);
            }
        } else {
            cart.clear();
        }

        if failed.is_empty() {
            info!(attempt_id, order_id = %order.id, total = %order.total(), "Checkout committed");
            Ok(CheckoutOutcome::Committed(order))
        } else {
            info!(
                attempt_id,
                order_id = %order.id,
                failed = failed.len(),
                "Checkout partially committed"
            );
            Ok(CheckoutOutcome::PartiallyCommitted {
                order,
                failed_lines: failed,
            })
        }
    }

    /// Gives back every line, newest first, and returns the ones that could
    /// not be restored. No retries: a failed or timed-out increment is left
    /// for reconciliation.
    async fn rollback(&self, lines: &[ReservedLine]) -> Vec<ReservedLine> {
        let attempt_id = self.attempt_id.as_str();
        let bound = self.coordinator.config.decrement_timeout;
        let mut unrestored = Vec::new();

        for line in lines.iter().rev() {
            let product_id = line.product_id.as_str();
            match timeout(
                bound,
                self.coordinator
                    .inventory
                    .increment(attempt_id, product_id, line.quantity),
            )
            .await
            {
                Ok(Ok(())) => {
                    warn!(attempt_id, product_id, quantity = line.quantity, "Line rolled back");
                }
                Ok(Err(e)) => {
                    error!(attempt_id, product_id, error = %e, "Rollback failed");
                    unrestored.push(line.clone());
                }
                Err(_) => {
                    error!(attempt_id, product_id, "Rollback timed out");
                    unrestored.push(line.clone());
                }
            }
        }

        unrestored
    }

    fn incomplete(&self, lines: Vec<ReservedLine>) -> CheckoutError {
        CheckoutError::RollbackIncomplete {
            attempt_id: self.attempt_id.clone(),
            lines,
        }
    }

    fn conflict(&self) -> CheckoutError {
        CheckoutError::AttemptConflict {
            attempt_id: self.attempt_id.clone(),
        }
    }
}

/// Resolves once the attempt is cancelled.
async fn cancellation(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryStore};
    use std::time::Duration;

    fn coordinator(store: &Arc<MemoryStore>) -> CheckoutCoordinator {
        CheckoutCoordinator::new(store.clone(), store.clone(), CheckoutConfig::default())
    }

    fn cart(lines: &[(&str, i64)]) -> Cart {
        let mut cart = Cart::new();
        for (id, qty) in lines {
            cart.add_or_increment(id, *qty).unwrap();
        }
        cart
    }

    fn partial() -> CheckoutOptions {
        CheckoutOptions {
            allow_partial: Some(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_commit_decrements_and_clears_cart() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        let mut cart = cart(&[("a", 2)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap();

        let order = match outcome {
            CheckoutOutcome::Committed(order) => order,
            other => panic!("expected Committed, got {:?}", other),
        };
        assert_eq!(order.quantity_of("a"), 2);
        assert_eq!(store.stock("a"), Some(3));
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_shortfall_rejects_without_decrement() {
        let store = MemoryStore::with_stock(&[("b", 1)]);
        let mut cart = cart(&[("b", 3)]);
        let before = cart.clone();

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CheckoutOutcome::Rejected(vec![LineRejection::new(
                "b",
                3,
                Some(1),
                RejectionReason::OutOfStock
            )])
        );
        assert_eq!(store.stock("b"), Some(1));
        assert_eq!(store.decrement_calls(), 0);
        assert_eq!(cart, before);
    }

    #[tokio::test]
    async fn test_lost_race_rolls_back_applied_lines() {
        let store = MemoryStore::with_stock(&[("a", 5), ("b", 1)]);
        store.inject("b", Fault::LoseRace { units: 1 });
        let mut cart = cart(&[("a", 2), ("b", 1)]);
        let before = cart.clone();

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CheckoutOutcome::Rejected(vec![LineRejection::new(
                "b",
                1,
                Some(0),
                RejectionReason::InsufficientStock
            )])
        );
        assert_eq!(store.stock("a"), Some(5));
        assert_eq!(store.stock("b"), Some(0));
        assert_eq!(cart, before);
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        let mut cart = cart(&[("a", 1), ("ghost", 1)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CheckoutOutcome::Rejected(vec![LineRejection::new(
                "ghost",
                1,
                None,
                RejectionReason::NotFound
            )])
        );
        assert_eq!(store.stock("a"), Some(5));
    }

    #[tokio::test]
    async fn test_partial_buys_what_is_available() {
        let store = MemoryStore::with_stock(&[("a", 5), ("b", 1), ("c", 0)]);
        let mut cart = cart(&[("a", 2), ("b", 3), ("c", 1)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", partial())
            .await
            .unwrap();

        let (order, failed) = match outcome {
            CheckoutOutcome::PartiallyCommitted { order, failed_lines } => (order, failed_lines),
            other => panic!("expected PartiallyCommitted, got {:?}", other),
        };
        assert_eq!(order.quantity_of("a"), 2);
        assert_eq!(order.quantity_of("b"), 1);
        assert_eq!(order.quantity_of("c"), 0);
        assert_eq!(
            failed,
            vec![
                LineRejection::new("b", 3, Some(1), RejectionReason::OutOfStock),
                LineRejection::new("c", 1, Some(0), RejectionReason::OutOfStock),
            ]
        );

        assert_eq!(store.stock("a"), Some(3));
        assert_eq!(store.stock("b"), Some(0));
        assert!(cart.get("a").is_none());
        assert_eq!(cart.get("b").unwrap().quantity, 2);
        assert_eq!(cart.get("c").unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_partial_with_lost_race_keeps_other_lines() {
        let store = MemoryStore::with_stock(&[("a", 5), ("b", 2)]);
        store.inject("b", Fault::LoseRace { units: 2 });
        let mut cart = cart(&[("a", 1), ("b", 2)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", partial())
            .await
            .unwrap();

        match outcome {
            CheckoutOutcome::PartiallyCommitted { order, failed_lines } => {
                assert_eq!(order.quantity_of("a"), 1);
                assert_eq!(
                    failed_lines,
                    vec![LineRejection::new("b", 2, Some(0), RejectionReason::InsufficientStock)]
                );
            }
            other => panic!("expected PartiallyCommitted, got {:?}", other),
        }
        assert_eq!(store.stock("a"), Some(4));
        assert_eq!(cart.get("b").unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_partial_with_nothing_available_is_rejected() {
        let store = MemoryStore::with_stock(&[("a", 0)]);
        let mut cart = cart(&[("a", 1)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", partial())
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Rejected(_)));
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_fully_satisfied_is_committed() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        let mut cart = cart(&[("a", 5)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", partial())
            .await
            .unwrap();

        assert!(outcome.is_committed());
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let store = MemoryStore::with_stock(&[]);
        let err = coordinator(&store)
            .checkout(&mut Cart::new(), "cust-1", CheckoutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_invalid_attempt_id() {
        let store = MemoryStore::with_stock(&[]);
        let options = CheckoutOptions {
            attempt_id: Some("has space".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            coordinator(&store).begin(options),
            Err(CheckoutError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_service_unavailable() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        store.fail_snapshots();
        let mut cart = cart(&[("a", 1)]);

        let (attempt, handle) = coordinator(&store).begin(CheckoutOptions::default()).unwrap();
        let err = attempt.run(&mut cart, "cust-1").await.unwrap_err();

        assert!(matches!(err, CheckoutError::ServiceUnavailable(_)));
        assert_eq!(handle.phase(), CheckoutPhase::Failed);
        assert_eq!(store.stock("a"), Some(5));
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_timeout() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        store.delay_snapshots(Duration::from_secs(30));
        let mut cart = cart(&[("a", 1)]);

        let err = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::ServiceUnavailable(ServiceError::Timeout { .. })
        ));
        assert_eq!(store.decrement_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decrement_timeout_rolls_back_landed_decrement() {
        let store = MemoryStore::with_stock(&[("a", 5), ("b", 5)]);
        store.inject("b", Fault::SlowAfterApply(Duration::from_secs(30)));
        let mut cart = cart(&[("a", 1), ("b", 2)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CheckoutOutcome::Rejected(vec![LineRejection::new(
                "b",
                2,
                None,
                RejectionReason::ServiceUnavailable
            )])
        );
        assert_eq!(store.stock("a"), Some(5));
        assert_eq!(store.stock("b"), Some(5));
    }

    #[tokio::test]
    async fn test_decrement_error_that_never_landed_restores_nothing_extra() {
        let store = MemoryStore::with_stock(&[("a", 5), ("b", 5)]);
        store.inject("b", Fault::Unavailable);
        let mut cart = cart(&[("a", 1), ("b", 1)]);

        let outcome = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Rejected(_)));
        assert_eq!(store.stock("a"), Some(5));
        assert_eq!(store.stock("b"), Some(5));
    }

    #[tokio::test]
    async fn test_rollback_failure_is_reported() {
        let store = MemoryStore::with_stock(&[("a", 5), ("b", 1)]);
        store.inject("a", Fault::RollbackUnavailable);
        store.inject("b", Fault::LoseRace { units: 1 });
        let mut cart = cart(&[("a", 2), ("b", 1)]);

        let err = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap_err();

        match err {
            CheckoutError::RollbackIncomplete { lines, .. } => {
                assert_eq!(
                    lines,
                    vec![ReservedLine {
                        product_id: "a".to_string(),
                        quantity: 2
                    }]
                );
            }
            other => panic!("expected RollbackIncomplete, got {:?}", other),
        }
        assert_eq!(store.stock("a"), Some(3));
    }

    #[tokio::test]
    async fn test_order_failure_rolls_back_everything() {
        let store = MemoryStore::with_stock(&[("a", 5), ("b", 5)]);
        store.fail_orders();
        let mut cart = cart(&[("a", 1), ("b", 2)]);
        let before = cart.clone();

        let err = coordinator(&store)
            .checkout(&mut cart, "cust-1", CheckoutOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::ServiceUnavailable(_)));
        assert_eq!(store.stock("a"), Some(5));
        assert_eq!(store.stock("b"), Some(5));
        assert_eq!(cart, before);
    }

    #[tokio::test]
    async fn test_cancel_during_validation() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        store.delay_snapshots(Duration::from_millis(500));
        let coordinator = CheckoutCoordinator::new(
            store.clone(),
            store.clone(),
            CheckoutConfig::default().snapshot_timeout(Duration::from_secs(60)),
        );

        let (attempt, handle) = coordinator.begin(CheckoutOptions::default()).unwrap();
        let task = tokio::spawn(async move {
            let mut cart = cart(&[("a", 1)]);
            let outcome = attempt.run(&mut cart, "cust-1").await;
            (outcome, cart)
        });

        while handle.phase() != CheckoutPhase::Validating {
            tokio::task::yield_now().await;
        }
        handle.cancel().unwrap();

        let (outcome, cart) = task.await.unwrap();
        assert_eq!(outcome.unwrap(), CheckoutOutcome::Cancelled);
        assert_eq!(cart.len(), 1);
        assert_eq!(store.stock("a"), Some(5));
        assert_eq!(store.decrement_calls(), 0);
        assert!(matches!(handle.cancel(), Ok(())));
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        let (attempt, handle) = coordinator(&store).begin(CheckoutOptions::default()).unwrap();
        handle.cancel().unwrap();

        let mut cart = cart(&[("a", 1)]);
        let outcome = attempt.run(&mut cart, "cust-1").await.unwrap();
        assert_eq!(outcome, CheckoutOutcome::Cancelled);
        assert_eq!(store.stock("a"), Some(5));
    }

    #[tokio::test]
    async fn test_cancel_during_reserving_is_refused() {
        let store = MemoryStore::with_stock(&[("a", 5)]);
        store.inject("a", Fault::SlowAfterApply(Duration::from_millis(300)));
        let coordinator = CheckoutCoordinator::new(
            store.clone(),
            store.clone(),
            CheckoutConfig::default().decrement_timeout(Duration::from_secs(60)),
        );

        let (attempt, handle) = coordinator.begin(CheckoutOptions::default()).unwrap();
        let task = tokio::spawn(async move {
            let mut cart = cart(&[("a", 1)]);
            attempt.run(&mut cart, "cust-1").await
        });

        while handle.phase() != CheckoutPhase::Reserving {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            handle.cancel(),
            Err(CheckoutError::CheckoutInProgress { .. })
        ));

        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.is_committed());
        assert!(matches!(
            handle.cancel(),
            Err(CheckoutError::AlreadySettled { .. })
        ));
    }

    fn with_attempt(attempt_id: &str) -> CheckoutOptions {
        CheckoutOptions {
            attempt_id: Some(attempt_id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reused_attempt_with_larger_cart_is_refused() {
        let store = MemoryStore::with_stock(&[("a", 10)]);
        // An earlier run of att-x took one unit and died before its order.
        store.conditional_decrement("att-x", "a", 1).await.unwrap();

        let mut cart = cart(&[("a", 5)]);
        let err = coordinator(&store)
            .checkout(&mut cart, "cust-1", with_attempt("att-x"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::AttemptConflict { ref attempt_id } if attempt_id == "att-x"));
        assert_eq!(store.stock("a"), Some(9));
        assert!(store.orders().is_empty());
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_reused_attempt_rolls_back_lines_taken_before_mismatch() {
        let store = MemoryStore::with_stock(&[("a", 10), ("b", 10)]);
        store.conditional_decrement("att-x", "b", 1).await.unwrap();

        let mut cart = cart(&[("a", 2), ("b", 4)]);
        let err = coordinator(&store)
            .checkout(&mut cart, "cust-1", with_attempt("att-x"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::AttemptConflict { .. }));
        assert_eq!(store.stock("a"), Some(10));
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_resubmitted_attempt_returns_same_order() {
        let store = MemoryStore::with_stock(&[("a", 10)]);
        let coordinator = coordinator(&store);

        let mut first = cart(&[("a", 2)]);
        let placed = coordinator
            .checkout(&mut first, "alice", with_attempt("att-x"))
            .await
            .unwrap();

        let mut again = cart(&[("a", 2)]);
        let replayed = coordinator
            .checkout(&mut again, "alice", with_attempt("att-x"))
            .await
            .unwrap();

        assert_eq!(placed, replayed);
        assert!(again.is_empty());
        assert_eq!(store.stock("a"), Some(8));
        assert_eq!(store.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_attempt_id_of_another_customer_is_refused() {
        let store = MemoryStore::with_stock(&[("a", 10), ("b", 10)]);
        let coordinator = coordinator(&store);

        let mut alice = cart(&[("a", 1)]);
        let placed = coordinator
            .checkout(&mut alice, "alice", with_attempt("att-x"))
            .await
            .unwrap();
        assert!(placed.is_committed());

        // Same cart contents, different customer.
        let mut bob = cart(&[("a", 1), ("b", 2)]);
        let err = coordinator
            .checkout(&mut bob, "bob", with_attempt("att-x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::AttemptConflict { .. }));
        assert_eq!(bob.len(), 2);
        assert_eq!(store.stock("a"), Some(9));
        assert_eq!(store.stock("b"), Some(10));

        let mut bob = cart(&[("a", 3)]);
        let err = coordinator
            .checkout(&mut bob, "bob", with_attempt("att-x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::AttemptConflict { .. }));
        assert_eq!(store.stock("a"), Some(9));

        let orders = store.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].customer_id, "alice");
        assert_eq!(orders[0].quantity_of("a"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_attempts_for_last_unit() {
        let store = MemoryStore::with_stock(&[("last", 1)]);
        let coordinator = coordinator(&store);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                let mut cart = cart(&[("last", 1)]);
                coordinator
                    .checkout(&mut cart, &format!("cust-{}", i), CheckoutOptions::default())
                    .await
            }));
        }

        let mut committed = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_committed() {
                committed += 1;
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(store.stock("last"), Some(0));
        assert_eq!(store.orders().len(), 1);
    }
}
