//! # Inventory Ledger
//!
//! Stock counters that change only through signed, attributed adjustments.
//!
//! ## Compare-and-Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve(product 7, qty 5)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE inventory SET quantity = quantity - 5                           │
//! │   WHERE product_id = 7 AND quantity >= 5                                │
//! │       │                                                                 │
//! │       ├── 1 row  ──► INSERT adjustment (delta -5, applied)              │
//! │       │                                                                 │
//! │       └── 0 rows ──► SELECT quantity                                    │
//! │                        ├── no row   ──► NotFound                        │
//! │                        └── 3 left   ──► InsufficientStock               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, and SQLite serializes writers,
//! so concurrent reservations can never drive stock below zero. The
//! `CHECK (quantity >= 0)` column constraint backs this up.
//!
//! Applied adjustments are written inside the caller's unit of work. A
//! rejected reservation is recorded with [`InventoryRepository::record_rejection`]
//! once that unit of work has rolled back.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::unit_of_work::UnitOfWork;
use storefront_core::validation::{validate_adjustment_context, validate_quantity};
use storefront_core::{new_id, CoreError, InventoryAdjustment, InventoryRecord, ProductId};

#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    product_id: i64,
    quantity: i64,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            product_id: row.product_id,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdjustmentRow {
    id: String,
    product_id: i64,
    delta: i64,
    reason: String,
    actor_id: String,
    applied: bool,
    created_at: DateTime<Utc>,
}

impl From<AdjustmentRow> for InventoryAdjustment {
    fn from(row: AdjustmentRow) -> Self {
        InventoryAdjustment {
            id: row.id,
            product_id: row.product_id,
            delta: row.delta,
            reason: row.reason,
            actor_id: row.actor_id,
            applied: row.applied,
            created_at: row.created_at,
        }
    }
}

/// Repository for the inventory ledger.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Registers a product in the ledger with its opening stock.
    ///
    /// The opening balance is itself an adjustment, so the log always sums to
    /// the current quantity.
    pub async fn create_record(
        &self,
        product_id: ProductId,
        quantity: i64,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<InventoryRecord> {
        if quantity < 0 {
            return Err(storefront_core::ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO inventory (product_id, quantity, updated_at) VALUES (?1, ?2, ?3)")
            .bind(product_id)
            .bind(quantity)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => {
                    DbError::duplicate("inventory.product_id", product_id.to_string())
                }
                other => other,
            })?;

        insert_adjustment(&mut tx, product_id, quantity, "opening balance", actor_id, true, now)
            .await?;

        tx.commit().await?;

        info!(product_id, quantity, "Inventory record created");
        Ok(InventoryRecord {
            product_id,
            quantity,
            updated_at: now,
        })
    }

    pub async fn get(&self, product_id: ProductId) -> DbResult<Option<InventoryRecord>> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT product_id, quantity, updated_at FROM inventory WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(InventoryRecord::from))
    }

    /// Atomically takes `qty` units out of stock (`delta = -qty`).
    ///
    /// ## Errors
    /// - `Core(Validation)` for a non-positive quantity or blank reason/actor
    /// - `NotFound` for an unknown product
    /// - `Core(InsufficientStock)` when fewer than `qty` units remain
    pub async fn reserve(
        &self,
        uow: &mut UnitOfWork,
        product_id: ProductId,
        qty: i64,
        reason: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        validate_quantity(qty)?;
        validate_adjustment_context(reason, actor_id)?;

        let conn = uow.conn();

        let result = sqlx::query(
            r#"
            UPDATE inventory SET
                quantity = quantity - ?2,
                updated_at = ?3
            WHERE product_id = ?1 AND quantity >= ?2
            "#,
        )
        .bind(product_id)
        .bind(qty)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT quantity FROM inventory WHERE product_id = ?1")
                    .bind(product_id)
                    .fetch_optional(&mut *conn)
                    .await?;

            return Err(match available {
                None => DbError::not_found("Inventory", product_id),
                Some(available) => CoreError::InsufficientStock {
                    product_id,
                    available,
                    requested: qty,
                }
                .into(),
            });
        }

        insert_adjustment(conn, product_id, -qty, reason, actor_id, true, now).await?;

        debug!(product_id, qty, reason, actor_id, "Stock reserved");
        Ok(())
    }

    /// Returns `qty` units to stock (`delta = +qty`).
    pub async fn release(
        &self,
        uow: &mut UnitOfWork,
        product_id: ProductId,
        qty: i64,
        reason: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        validate_quantity(qty)?;
        validate_adjustment_context(reason, actor_id)?;

        let conn = uow.conn();
        increment(conn, product_id, qty, now).await?;
        insert_adjustment(conn, product_id, qty, reason, actor_id, true, now).await?;

        debug!(product_id, qty, reason, actor_id, "Stock released");
        Ok(())
    }

    /// Adds delivered stock in its own transaction.
    pub async fn restock(
        &self,
        product_id: ProductId,
        qty: i64,
        reason: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<InventoryRecord> {
        validate_quantity(qty)?;
        validate_adjustment_context(reason, actor_id)?;

        let mut tx = self.pool.begin().await?;
        increment(&mut tx, product_id, qty, now).await?;
        insert_adjustment(&mut tx, product_id, qty, reason, actor_id, true, now).await?;

        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT product_id, quantity, updated_at FROM inventory WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(product_id, qty, reason, actor_id, "Stock replenished");
        Ok(row.into())
    }

    /// Logs a reservation that was refused. The counter is untouched.
    ///
    /// Call this after the enclosing unit of work has rolled back, otherwise
    /// the record would roll back with it.
    pub async fn record_rejection(
        &self,
        product_id: ProductId,
        requested: i64,
        reason: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        warn!(product_id, requested, reason, actor_id, "Stock reservation rejected");

        let mut conn = self.pool.acquire().await?;
        insert_adjustment(&mut conn, product_id, -requested, reason, actor_id, false, now).await
    }

    /// Every adjustment for a product, oldest first.
    pub async fn history(&self, product_id: ProductId) -> DbResult<Vec<InventoryAdjustment>> {
        let rows = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            SELECT id, product_id, delta, reason, actor_id, applied, created_at
            FROM inventory_adjustments
            WHERE product_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InventoryAdjustment::from).collect())
    }
}

async fn increment(
    conn: &mut SqliteConnection,
    product_id: ProductId,
    qty: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE inventory SET quantity = quantity + ?2, updated_at = ?3 WHERE product_id = ?1",
    )
    .bind(product_id)
    .bind(qty)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Inventory", product_id));
    }
    Ok(())
}

async fn insert_adjustment(
    conn: &mut SqliteConnection,
    product_id: ProductId,
    delta: i64,
    reason: &str,
    actor_id: &str,
    applied: bool,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_adjustments (
            id, product_id, delta, reason, actor_id, applied, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(new_id())
    .bind(product_id)
    .bind(delta)
    .bind(reason)
    .bind(actor_id)
    .bind(applied)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
