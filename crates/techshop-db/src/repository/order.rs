//! # Order Repository
//!
//! Creates orders from reserved lines and reads them back.
//!
//! ## Order Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    INSERT orders (id, attempt_id UNIQUE, customer_id, 0, now)           │
//! │    for each reserved line:                                              │
//! │        SELECT product ──► freeze name / brand / price                   │
//! │        UPDATE reservation held ──► committed (same qty, else abort)     │
//! │        INSERT order_lines                                               │
//! │    UPDATE orders SET total_cents                                        │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One attempt produces at most one order: a second create for the same
//! attempt fails on the UNIQUE constraint and the caller can read the
//! existing order with [`OrderRepository::get_by_attempt`].
//!
//! Every order line must match a held reservation of the same attempt,
//! product and quantity, so an order never lists more units than were
//! taken from stock.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use techshop_core::validation::{validate_attempt_id, validate_customer_id, validate_quantity};
use techshop_core::{new_id, Money, Order, OrderLine, Product, ReservedLine, ValidationError};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    attempt_id: String,
    customer_id: String,
    total_cents: i64,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            attempt_id: self.attempt_id,
            customer_id: self.customer_id,
            lines,
            total_cents: self.total_cents,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates an order for the reserved lines of one checkout attempt and
    /// marks the attempt's held reservations as committed.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - the attempt already has an order
    /// * `Err(DbError::NotFound)` - a line references a missing product
    /// * `Err(DbError::ReservationMismatch)` - a line has no held
    ///   reservation of exactly that quantity
    pub async fn create(
        &self,
        attempt_id: &str,
        customer_id: &str,
        lines: &[ReservedLine],
    ) -> DbResult<Order> {
        validate_attempt_id(attempt_id)?;
        validate_customer_id(customer_id)?;
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "order lines".to_string(),
            }
            .into());
        }
        for line in lines {
            validate_quantity(line.quantity)?;
        }

        let order_id = new_id();
        let now = Utc::now();

        debug!(order_id = %order_id, attempt_id, lines = lines.len(), "Creating order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, attempt_id, customer_id, total_cents, created_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            "#,
        )
        .bind(&order_id)
        .bind(attempt_id)
        .bind(customer_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut order_lines = Vec::with_capacity(lines.len());
        for (line_no, reserved) in lines.iter().enumerate() {
            let product = sqlx::query_as::<_, Product>(
                r#"
                SELECT id, name, description, brand, price_cents, unit_in_stock,
                       category_id, image_url, is_active, created_at, updated_at
                FROM products
                WHERE id = ?1
                "#,
            )
            .bind(&reserved.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &reserved.product_id))?;

            let committed = sqlx::query(
                r#"
                UPDATE inventory_reservations
                SET status = 'committed', updated_at = ?4
                WHERE attempt_id = ?1 AND product_id = ?2 AND quantity = ?3 AND status = 'held'
                "#,
            )
            .bind(attempt_id)
            .bind(&reserved.product_id)
            .bind(reserved.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if committed.rows_affected() == 0 {
                return Err(DbError::ReservationMismatch {
                    attempt_id: attempt_id.to_string(),
                    product_id: reserved.product_id.clone(),
                    quantity: reserved.quantity,
                });
            }

            let line = OrderLine::snapshot(&product, reserved.quantity);

            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    order_id, line_no, product_id, product_name, brand,
                    unit_price_cents, quantity, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&order_id)
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(&line.brand)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;

            order_lines.push(line);
        }

        let total: Money = order_lines
            .iter()
            .map(|l| Money::from_cents(l.line_total_cents))
            .sum();

        sqlx::query("UPDATE orders SET total_cents = ?2 WHERE id = ?1")
            .bind(&order_id)
            .bind(total.cents())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %order_id, attempt_id, customer_id, total = %total, "Order created");

        Ok(Order {
            id: order_id,
            attempt_id: attempt_id.to_string(),
            customer_id: customer_id.to_string(),
            lines: order_lines,
            total_cents: total.cents(),
            created_at: now,
        })
    }

    /// Gets an order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, attempt_id, customer_id, total_cents, created_at FROM orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.with_lines(row).await
    }

    /// Gets the order produced by a checkout attempt, if any.
    pub async fn get_by_attempt(&self, attempt_id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, attempt_id, customer_id, total_cents, created_at FROM orders WHERE attempt_id = ?1",
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        self.with_lines(row).await
    }

    async fn with_lines(&self, row: Option<OrderRow>) -> DbResult<Option<Order>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT product_id, product_name, brand, unit_price_cents, quantity, line_total_cents
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_order(lines)))
    }
}
