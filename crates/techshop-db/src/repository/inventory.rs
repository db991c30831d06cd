//! # Inventory Repository
//!
//! The only code that changes `products.unit_in_stock`.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    INSERT reservation (attempt, product, qty, 'held')                   │
//! │        ON CONFLICT DO NOTHING ──► already there? report, no change      │
//! │                                   (same qty: Applied, else Mismatch)    │
//! │    UPDATE products SET unit_in_stock = unit_in_stock - qty              │
//! │        WHERE id = ? AND is_active = 1 AND unit_in_stock >= qty          │
//! │        │                                                                │
//! │        ├── 1 row  ──► COMMIT   ──► Applied                              │
//! │        └── 0 rows ──► ROLLBACK ──► InsufficientStock | NotFound         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two checkouts racing for the last unit both reach the UPDATE; SQLite runs
//! them one after the other and the second one matches zero rows. Stock can
//! never go below zero and no read-then-write window exists.
//!
//! Every transaction here starts with a write, so the connection takes the
//! write lock before reading anything and never has to upgrade a stale read
//! snapshot.
//!
//! ## Release
//! A rollback flips the ledger row from `held` to `released` and restores
//! the recorded quantity in one transaction. Releasing twice, or releasing a
//! decrement that never landed, changes nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use techshop_core::validation::{validate_attempt_id, validate_quantity, validate_restock};
use techshop_core::{DecrementOutcome, InventorySnapshot};

/// State of one (attempt, product) ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Stock is taken, no order yet.
    Held,
    /// Stock was given back.
    Released,
    /// Stock belongs to a placed order.
    Committed,
}

/// One row of the reservation ledger.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ReservationRecord {
    pub attempt_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Reads current stock for the given products in one query.
    ///
    /// Unknown and inactive products are absent from the result.
    pub async fn snapshot(&self, product_ids: &[String]) -> DbResult<InventorySnapshot> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, unit_in_stock FROM products WHERE is_active = 1 AND id IN (",
        );
        let mut ids = query.separated(", ");
        for id in product_ids {
            ids.push_bind(id);
        }
        ids.push_unseparated(")");

        let rows: Vec<(String, i64)> = query.build_query_as().fetch_all(&self.pool).await?;

        debug!(requested = product_ids.len(), found = rows.len(), "Inventory snapshot");
        Ok(rows.into_iter().collect())
    }

    /// Current stock of one active product.
    pub async fn stock_of(&self, product_id: &str) -> DbResult<Option<i64>> {
        let stock = sqlx::query_scalar(
            "SELECT unit_in_stock FROM products WHERE id = ?1 AND is_active = 1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    /// Takes `quantity` units for `attempt_id` if, and only if, at least that
    /// many are in stock.
    ///
    /// Idempotent per (attempt, product): repeating a decrement that already
    /// landed returns `Applied` without taking more stock. Repeating it with
    /// a different quantity returns `AttemptMismatch` and changes nothing.
    pub async fn conditional_decrement(
        &self,
        attempt_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<DecrementOutcome> {
        validate_attempt_id(attempt_id)?;
        validate_quantity(quantity)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let ledger = sqlx::query(
            r#"
            INSERT INTO inventory_reservations
                (attempt_id, product_id, quantity, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'held', ?4, ?4)
            ON CONFLICT (attempt_id, product_id) DO NOTHING
            "#,
        )
        .bind(attempt_id)
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if ledger.rows_affected() == 0 {
            let (held, status): (i64, ReservationStatus) = sqlx::query_as(
                "SELECT quantity, status FROM inventory_reservations WHERE attempt_id = ?1 AND product_id = ?2",
            )
            .bind(attempt_id)
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;

            return match status {
                ReservationStatus::Held | ReservationStatus::Committed if held == quantity => {
                    debug!(attempt_id, product_id, "Decrement already applied");
                    Ok(DecrementOutcome::Applied)
                }
                ReservationStatus::Held | ReservationStatus::Committed => {
                    warn!(attempt_id, product_id, held, quantity, "Attempt already holds a different quantity");
                    Ok(DecrementOutcome::AttemptMismatch { held })
                }
                ReservationStatus::Released => {
                    warn!(attempt_id, product_id, "Decrement requested after release");
                    let available = self.stock_of(product_id).await?;
                    Ok(available.map_or(DecrementOutcome::NotFound, |available| {
                        DecrementOutcome::InsufficientStock { available }
                    }))
                }
            };
        }

        let updated = sqlx::query(
            r#"
            UPDATE products
            SET unit_in_stock = unit_in_stock - ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1 AND unit_in_stock >= ?2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 1 {
            tx.commit().await?;
            info!(attempt_id, product_id, quantity, "Stock decremented");
            return Ok(DecrementOutcome::Applied);
        }

        let available: Option<i64> = sqlx::query_scalar(
            "SELECT unit_in_stock FROM products WHERE id = ?1 AND is_active = 1",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.rollback().await?;

        match available {
            Some(available) => {
                warn!(attempt_id, product_id, quantity, available, "Insufficient stock at decrement");
                Ok(DecrementOutcome::InsufficientStock { available })
            }
            None => {
                warn!(attempt_id, product_id, "Decrement for unknown product");
                Ok(DecrementOutcome::NotFound)
            }
        }
    }

    /// Gives back the units `attempt_id` holds for `product_id`.
    ///
    /// Returns the number of units restored: the held quantity the first
    /// time, 0 when nothing is held (never decremented, already released, or
    /// already part of an order).
    pub async fn release(&self, attempt_id: &str, product_id: &str) -> DbResult<i64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE inventory_reservations
            SET status = 'released', updated_at = ?3
            WHERE attempt_id = ?1 AND product_id = ?2 AND status = 'held'
            "#,
        )
        .bind(attempt_id)
        .bind(product_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(attempt_id, product_id, "Nothing held to release");
            return Ok(0);
        }

        let quantity: i64 = sqlx::query_scalar(
            "SELECT quantity FROM inventory_reservations WHERE attempt_id = ?1 AND product_id = ?2",
        )
        .bind(attempt_id)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let restored = sqlx::query(
            "UPDATE products SET unit_in_stock = unit_in_stock + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if restored.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        tx.commit().await?;
        info!(attempt_id, product_id, quantity, "Reservation released");
        Ok(quantity)
    }

    /// Adds units to a product. Returns the new stock level.
    pub async fn restock(&self, product_id: &str, units: i64) -> DbResult<i64> {
        validate_restock(units)?;

        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET unit_in_stock = unit_in_stock + ?2, updated_at = ?3
            WHERE id = ?1
            RETURNING unit_in_stock
            "#,
        )
        .bind(product_id)
        .bind(units)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        let stock = stock.ok_or_else(|| DbError::not_found("Product", product_id))?;
        info!(product_id, units, stock, "Product restocked");
        Ok(stock)
    }

    /// Ledger rows written by one attempt, in product id order.
    pub async fn reservations_for(&self, attempt_id: &str) -> DbResult<Vec<ReservationRecord>> {
        let rows = sqlx::query_as::<_, ReservationRecord>(
            r#"
            SELECT attempt_id, product_id, quantity, status, created_at, updated_at
            FROM inventory_reservations
            WHERE attempt_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seeded;

    #[tokio::test]
    async fn test_snapshot() {
        let db = seeded(&[("a", 100, 5), ("b", 100, 0), ("c", 100, 2)]).await;
        db.products().set_active("c", false).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string(), "zzz".to_string()];
        let snap = db.inventory().snapshot(&ids).await.unwrap();

        assert_eq!(snap.len(), 2);
        assert_eq!(snap["a"], 5);
        assert_eq!(snap["b"], 0);
        assert!(db.inventory().snapshot(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_applies_when_enough_stock() {
        let db = seeded(&[("a", 100, 5)]).await;
        let inv = db.inventory();

        assert_eq!(
            inv.conditional_decrement("att-1", "a", 2).await.unwrap(),
            DecrementOutcome::Applied
        );
        assert_eq!(inv.stock_of("a").await.unwrap(), Some(3));

        let ledger = inv.reservations_for("att-1").await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].quantity, 2);
        assert_eq!(ledger[0].status, ReservationStatus::Held);
    }

    #[tokio::test]
    async fn test_decrement_is_idempotent_per_attempt() {
        let db = seeded(&[("a", 100, 5)]).await;
        let inv = db.inventory();

        inv.conditional_decrement("att-1", "a", 2).await.unwrap();
        let again = inv.conditional_decrement("att-1", "a", 2).await.unwrap();

        assert_eq!(again, DecrementOutcome::Applied);
        assert_eq!(inv.stock_of("a").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_decrement_replay_with_other_quantity_is_refused() {
        let db = seeded(&[("a", 100, 10)]).await;
        let inv = db.inventory();

        inv.conditional_decrement("att-1", "a", 1).await.unwrap();

        let outcome = inv.conditional_decrement("att-1", "a", 5).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::AttemptMismatch { held: 1 });
        assert_eq!(inv.stock_of("a").await.unwrap(), Some(9));

        let ledger = inv.reservations_for("att-1").await.unwrap();
        assert_eq!(ledger[0].quantity, 1);
        assert_eq!(ledger[0].status, ReservationStatus::Held);
    }

    #[tokio::test]
    async fn test_decrement_refuses_to_oversell() {
        let db = seeded(&[("a", 100, 1)]).await;
        let inv = db.inventory();

        let outcome = inv.conditional_decrement("att-1", "a", 3).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::InsufficientStock { available: 1 });
        assert_eq!(inv.stock_of("a").await.unwrap(), Some(1));
        assert!(inv.reservations_for("att-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_unknown_or_inactive_product() {
        let db = seeded(&[("a", 100, 4)]).await;
        db.products().set_active("a", false).await.unwrap();
        let inv = db.inventory();

        assert_eq!(
            inv.conditional_decrement("att-1", "ghost", 1).await.unwrap(),
            DecrementOutcome::NotFound
        );
        assert_eq!(
            inv.conditional_decrement("att-1", "a", 1).await.unwrap(),
            DecrementOutcome::NotFound
        );
        assert!(inv.reservations_for("att-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_rejects_bad_quantity() {
        let db = seeded(&[("a", 100, 4)]).await;
        let err = db.inventory().conditional_decrement("att-1", "a", 0).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_release_restores_exactly_once() {
        let db = seeded(&[("a", 100, 5)]).await;
        let inv = db.inventory();

        inv.conditional_decrement("att-1", "a", 2).await.unwrap();
        assert_eq!(inv.release("att-1", "a").await.unwrap(), 2);
        assert_eq!(inv.release("att-1", "a").await.unwrap(), 0);
        assert_eq!(inv.stock_of("a").await.unwrap(), Some(5));

        let ledger = inv.reservations_for("att-1").await.unwrap();
        assert_eq!(ledger[0].status, ReservationStatus::Released);

        // A released attempt cannot take the stock again.
        let outcome = inv.conditional_decrement("att-1", "a", 2).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::InsufficientStock { available: 5 });
        assert_eq!(inv.stock_of("a").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_release_without_decrement_is_noop() {
        let db = seeded(&[("a", 100, 5)]).await;
        assert_eq!(db.inventory().release("never", "a").await.unwrap(), 0);
        assert_eq!(db.inventory().stock_of("a").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_restock() {
        let db = seeded(&[("a", 100, 0)]).await;
        assert_eq!(db.inventory().restock("a", 7).await.unwrap(), 7);
        assert!(db.inventory().restock("a", 0).await.is_err());
        assert!(matches!(
            db.inventory().restock("ghost", 1).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_oversell() {
        let db = seeded(&[("last", 100, 1)]).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let inv = db.inventory();
            handles.push(tokio::spawn(async move {
                inv.conditional_decrement(&format!("att-{}", i), "last", 1).await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == DecrementOutcome::Applied {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(db.inventory().stock_of("last").await.unwrap(), Some(0));
    }
}
