//! # SQLite Adapters
//!
//! Implements the checkout ports on [`Database`]. Errors are classified by
//! `From<DbError> for ServiceError`.
//!
//! A repeated `create_order` for an attempt returns the stored order only
//! when customer and lines are the same; anything else is a conflict.

use async_trait::async_trait;
use tracing::{debug, warn};

use techshop_core::{Category, DecrementOutcome, InventorySnapshot, Order, Product, ReservedLine};
use techshop_db::{Database, DbError};

use crate::error::ServiceResult;
use crate::ports::{CatalogService, InventoryStore, OrderService};

#[async_trait]
impl CatalogService for Database {
    async fn get_product(&self, product_id: &str) -> ServiceResult<Option<Product>> {
        Ok(self.products().get_by_id(product_id).await?)
    }

    async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.products().list_active(None).await?)
    }

    async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.categories().list().await?)
    }
}

#[async_trait]
impl InventoryStore for Database {
    async fn snapshot(&self, product_ids: &[String]) -> ServiceResult<InventorySnapshot> {
        Ok(self.inventory().snapshot(product_ids).await?)
    }

    async fn conditional_decrement(
        &self,
        attempt_id: &str,
        product_id: &str,
        amount: i64,
    ) -> ServiceResult<DecrementOutcome> {
        Ok(self
            .inventory()
            .conditional_decrement(attempt_id, product_id, amount)
            .await?)
    }

    async fn increment(&self, attempt_id: &str, product_id: &str, amount: i64) -> ServiceResult<()> {
        let restored = self.inventory().release(attempt_id, product_id).await?;
        if restored != 0 && restored != amount {
            warn!(attempt_id, product_id, amount, restored, "Restored quantity differs from request");
        }
        Ok(())
    }
}

#[async_trait]
impl OrderService for Database {
    async fn create_order(
        &self,
        attempt_id: &str,
        customer_id: &str,
        lines: &[ReservedLine],
    ) -> ServiceResult<Order> {
        match self.orders().create(attempt_id, customer_id, lines).await {
            Ok(order) => Ok(order),
            Err(DbError::UniqueViolation { .. }) => {
                match self.orders().get_by_attempt(attempt_id).await? {
                    Some(order) if order.matches_request(customer_id, lines) => {
                        debug!(attempt_id, order_id = %order.id, "Order already exists for attempt");
                        Ok(order)
                    }
                    _ => {
                        warn!(attempt_id, customer_id, "Attempt id already used for another order");
                        Err(DbError::duplicate("attempt_id", attempt_id).into())
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_order(&self, order_id: &str) -> ServiceResult<Option<Order>> {
        Ok(self.orders().get_by_id(order_id).await?)
    }
}

// =============================================================================
// End-to-End Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use techshop_core::{Cart, CheckoutOptions, CheckoutOutcome, LineRejection, RejectionReason};
    use techshop_db::{DbConfig, ReservationStatus};

    use super::*;
    use crate::{CheckoutConfig, CheckoutCoordinator, CheckoutError, ServiceError};

    fn product(id: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            description: None,
            brand: "Acme".to_string(),
            price_cents,
            unit_in_stock: stock,
            category_id: None,
            image_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded(products: &[(&str, i64, i64)]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (id, price, stock) in products {
            db.products().insert(&product(id, *price, *stock)).await.unwrap();
        }
        db
    }

    fn coordinator(db: &Database) -> CheckoutCoordinator {
        let db = Arc::new(db.clone());
        CheckoutCoordinator::new(db.clone(), db, CheckoutConfig::default())
    }

    async fn stock(db: &Database, id: &str) -> i64 {
        db.inventory().stock_of(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_checkout_places_order_in_sqlite() {
        let db = seeded(&[("a", 1299, 5), ("b", 500, 2)]).await;
        let mut cart = Cart::new();
        cart.add_or_increment("a", 2).unwrap();
        cart.add_or_increment("b", 1).unwrap();

        let options = CheckoutOptions {
            attempt_id: Some("att-e2e".to_string()),
            ..Default::default()
        };
        let outcome = coordinator(&db).checkout(&mut cart, "cust-1", options).await.unwrap();

        let order = match outcome {
            CheckoutOutcome::Committed(order) => order,
            other => panic!("expected Committed, got {:?}", other),
        };
        assert_eq!(order.total_cents, 2 * 1299 + 500);
        assert_eq!(stock(&db, "a").await, 3);
        assert_eq!(stock(&db, "b").await, 1);
        assert!(cart.is_empty());

        let stored = db.orders().get_by_attempt("att-e2e").await.unwrap().unwrap();
        assert_eq!(stored.id, order.id);

        let ledger = db.inventory().reservations_for("att-e2e").await.unwrap();
        assert!(ledger.iter().all(|r| r.status == ReservationStatus::Committed));
    }

    #[tokio::test]
    async fn test_shortfall_leaves_sqlite_untouched() {
        let db = seeded(&[("a", 1000, 5), ("b", 1000, 1)]).await;
        let mut cart = Cart::new();
        cart.add_or_increment("a", 2).unwrap();
        cart.add_or_increment("b", 3).unwrap();

        let outcome = coordinator(&db)
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
        assert_eq!(stock(&db, "a").await, 5);
        assert_eq!(stock(&db, "b").await, 1);
        assert_eq!(cart.len(), 2);
    }

    #[tokio::test]
    async fn test_increment_restores_once() {
        let db = seeded(&[("a", 1000, 5)]).await;

        db.conditional_decrement("att-1", "a", 2).await.unwrap();
        db.increment("att-1", "a", 2).await.unwrap();
        db.increment("att-1", "a", 2).await.unwrap();
        assert_eq!(stock(&db, "a").await, 5);

        db.increment("att-never", "a", 2).await.unwrap();
        assert_eq!(stock(&db, "a").await, 5);
    }

    #[tokio::test]
    async fn test_create_order_is_idempotent_per_attempt() {
        let db = seeded(&[("a", 1000, 5)]).await;
        let lines = [ReservedLine {
            product_id: "a".to_string(),
            quantity: 1,
        }];

        db.conditional_decrement("att-1", "a", 1).await.unwrap();
        let first = db.create_order("att-1", "cust-1", &lines).await.unwrap();
        let second = db.create_order("att-1", "cust-1", &lines).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(db.get_order(&first.id).await.unwrap(), Some(first));
    }

    fn with_attempt(attempt_id: &str) -> CheckoutOptions {
        CheckoutOptions {
            attempt_id: Some(attempt_id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reused_attempt_never_orders_more_than_taken() {
        let db = seeded(&[("a", 1000, 10)]).await;
        // A first run of att-x took one unit, then died before its order.
        db.conditional_decrement("att-x", "a", 1).await.unwrap();

        let mut cart = Cart::new();
        cart.add_or_increment("a", 5).unwrap();
        let err = coordinator(&db)
            .checkout(&mut cart, "cust-1", with_attempt("att-x"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::AttemptConflict { .. }));
        assert!(db.orders().get_by_attempt("att-x").await.unwrap().is_none());
        assert_eq!(stock(&db, "a").await, 9);
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_two_customers_sharing_an_attempt_id() {
        let db = seeded(&[("a", 1000, 10)]).await;
        let coordinator = coordinator(&db);

        let mut alice = Cart::new();
        alice.add_or_increment("a", 1).unwrap();
        let placed = coordinator
            .checkout(&mut alice, "alice", with_attempt("att-x"))
            .await
            .unwrap();
        let alice_order = match placed {
            CheckoutOutcome::Committed(order) => order,
            other => panic!("expected Committed, got {:?}", other),
        };

        for quantity in [1, 3] {
            let mut bob = Cart::new();
            bob.add_or_increment("a", quantity).unwrap();
            let err = coordinator
                .checkout(&mut bob, "bob", with_attempt("att-x"))
                .await
                .unwrap_err();

            assert!(matches!(err, CheckoutError::AttemptConflict { .. }));
            assert_eq!(bob.len(), 1);
        }

        let stored = db.orders().get_by_attempt("att-x").await.unwrap().unwrap();
        assert_eq!(stored.id, alice_order.id);
        assert_eq!(stored.customer_id, "alice");
        assert_eq!(stored.quantity_of("a"), 1);
        assert_eq!(stock(&db, "a").await, 9);
    }

    #[tokio::test]
    async fn test_create_order_replay_must_match() {
        let db = seeded(&[("a", 1000, 5)]).await;
        let lines = [ReservedLine {
            product_id: "a".to_string(),
            quantity: 1,
        }];
        db.conditional_decrement("att-1", "a", 1).await.unwrap();
        db.create_order("att-1", "cust-1", &lines).await.unwrap();

        let err = db.create_order("att-1", "cust-2", &lines).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_for_last_unit() {
        let db = seeded(&[("pixel", 69900, 1)]).await;
        let coordinator = coordinator(&db);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                let mut cart = Cart::new();
                cart.add_or_increment("pixel", 1).unwrap();
                coordinator
                    .checkout(&mut cart, &format!("cust-{}", i), CheckoutOptions::default())
                    .await
            }));
        }

        let mut committed = 0;
        for task in tasks {
            match task.await.unwrap().unwrap() {
                CheckoutOutcome::Committed(_) => committed += 1,
                CheckoutOutcome::Rejected(_) => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(stock(&db, "pixel").await, 0);
    }
}
