//! # Payment Repository
//!
//! One payment per order, created PENDING in the order's unit of work and
//! settled later by a gateway callback or a staff override.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::unit_of_work::UnitOfWork;
use storefront_core::{Money, Payment, PaymentMethod, PaymentStatus};

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    method: PaymentMethod,
    status: PaymentStatus,
    amount: i64,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            order_id: row.order_id,
            method: row.method,
            status: row.status,
            amount: Money::from_minor(row.amount),
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, order_id, method, status, amount, transaction_id, created_at, updated_at
    FROM payments
"#;

/// Repository for payments.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn insert(&self, uow: &mut UnitOfWork, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, method, status, amount, transaction_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.status)
        .bind(payment.amount.minor_units())
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(uow.conn())
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("payments.order_id", payment.order_id.clone())
            }
            other => other,
        })?;

        debug!(payment_id = %payment.id, order_id = %payment.order_id, "Payment staged");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_where(&mut conn, "id", id).await
    }

    pub async fn get_in(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Option<Payment>> {
        fetch_where(uow.conn(), "id", id).await
    }

    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_where(&mut conn, "order_id", order_id).await
    }

    pub async fn get_by_transaction(&self, transaction_id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_where(&mut conn, "transaction_id", transaction_id).await
    }

    /// Settles a PENDING payment. Returns false if it is missing or no
    /// longer PENDING.
    pub async fn settle(
        &self,
        uow: &mut UnitOfWork,
        id: &str,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = ?2,
                transaction_id = COALESCE(?3, transaction_id),
                updated_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(transaction_id)
        .bind(now)
        .execute(uow.conn())
        .await?;

        let settled = result.rows_affected() == 1;
        if settled {
            info!(payment_id = %id, %status, "Payment settled");
        }
        Ok(settled)
    }

    /// Sets any status, regardless of the current one.
    pub async fn override_status(
        &self,
        id: &str,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = ?2,
                transaction_id = COALESCE(?3, transaction_id),
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(transaction_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", id));
        }

        let payment = fetch_where(&mut tx, "id", id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))?;
        tx.commit().await?;

        info!(payment_id = %id, %status, "Payment status overridden");
        Ok(payment)
    }
}

async fn fetch_where(
    conn: &mut SqliteConnection,
    column: &'static str,
    value: &str,
) -> DbResult<Option<Payment>> {
    let sql = format!("{SELECT_PAYMENT} WHERE {column} = ?1");
    let row = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(value)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Payment::from))
}

// =============================================================================
// Unit Tests
// =============================================================================
