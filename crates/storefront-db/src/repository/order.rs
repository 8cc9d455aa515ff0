//! # Order Repository
//!
//! Orders with their lines and shipping info, stored across three tables
//! and always written together.
//!
//! ## Tables
//! ```text
//! orders ──┬── order_lines   (position = cart order)
//!          └── shipping_info (1:1)
//! ```
//!
//! Status changes are conditional on the expected current status
//! (`WHERE id = ? AND status = ?`), so two racing transitions cannot both
//! win. Deleting an order cascades to its lines, shipping info and payment.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::unit_of_work::UnitOfWork;
use storefront_core::{Money, Order, OrderLine, OrderStatus, ShippingInfo};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    customer_id: String,
    status: OrderStatus,
    subtotal: i64,
    discount_amount: i64,
    shipping_fee: i64,
    total_price: i64,
    applied_discount_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    product_id: i64,
    quantity: i64,
    unit_price: i64,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        OrderLine {
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: Money::from_minor(row.unit_price),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingRow {
    address: String,
    phone_number: String,
    carrier: String,
    fee: i64,
    estimated_delivery: Option<NaiveDate>,
}

impl From<ShippingRow> for ShippingInfo {
    fn from(row: ShippingRow) -> Self {
        ShippingInfo {
            address: row.address,
            phone_number: row.phone_number,
            carrier: row.carrier,
            fee: Money::from_minor(row.fee),
            estimated_delivery: row.estimated_delivery,
        }
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, customer_id, status, subtotal, discount_amount, shipping_fee,
           total_price, applied_discount_id, created_at, updated_at
    FROM orders
"#;

// =============================================================================
// Filter
// =============================================================================

/// Listing filter. Pages are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    /// Restricts to one customer's orders.
    pub customer_id: Option<String>,
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_to: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_size: u32,
}

impl OrderFilter {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_to = Some(to);
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    fn limit(&self) -> i64 {
        self.page_size.clamp(1, Self::MAX_PAGE_SIZE) as i64
    }

    fn offset(&self) -> i64 {
        self.page as i64 * self.limit()
    }
}

impl Default for OrderFilter {
    fn default() -> Self {
        OrderFilter {
            customer_id: None,
            status: None,
            created_from: None,
            created_to: None,
            page: 0,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Stages the order row, its lines (in cart order) and its shipping info.
    pub async fn insert(&self, uow: &mut UnitOfWork, order: &Order) -> DbResult<()> {
        let conn = uow.conn();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, status, subtotal, discount_amount, shipping_fee,
                total_price, applied_discount_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.subtotal.minor_units())
        .bind(order.discount_amount.minor_units())
        .bind(order.shipping_fee.minor_units())
        .bind(order.total_price.minor_units())
        .bind(&order.applied_discount_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, product_id, quantity, unit_price)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price.minor_units())
            .execute(&mut *conn)
            .await?;
        }

        let shipping = &order.shipping;
        sqlx::query(
            r#"
            INSERT INTO shipping_info (
                order_id, address, phone_number, carrier, fee, estimated_delivery
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&order.id)
        .bind(&shipping.address)
        .bind(&shipping.phone_number)
        .bind(&shipping.carrier)
        .bind(shipping.fee.minor_units())
        .bind(shipping.estimated_delivery)
        .execute(&mut *conn)
        .await?;

        debug!(order_id = %order.id, lines = order.lines.len(), "Order staged");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    /// Reads an order through the unit of work, seeing its staged writes.
    pub async fn get_in(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Option<Order>> {
        load(uow.conn(), id).await
    }

    /// Moves `id` from `from` to `to` if it is still in `from`.
    ///
    /// Returns false when the order is missing or its status has changed.
    /// The state machine itself is checked by the caller.
    pub async fn transition(
        &self,
        uow: &mut UnitOfWork,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(uow.conn())
        .await?;

        let moved = result.rows_affected() == 1;
        if moved {
            info!(order_id = %id, %from, %to, "Order status changed");
        }
        Ok(moved)
    }

    /// Purges an order with its lines, shipping info and payment.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        info!(order_id = %id, "Order deleted");
        Ok(())
    }

    /// Lists orders matching `filter`, newest first.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            r#"{SELECT_ORDER}
            WHERE (?1 IS NULL OR customer_id = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at < ?4)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?5 OFFSET ?6
            "#
        );

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(&filter.customer_id)
            .bind(filter.status)
            .bind(filter.created_from)
            .bind(filter.created_to)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&mut *conn)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(assemble(&mut conn, row).await?);
        }

        debug!(count = orders.len(), page = filter.page, "Orders listed");
        Ok(orders)
    }
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("{SELECT_ORDER} WHERE id = ?1");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(assemble(conn, row).await?)),
        None => Ok(None),
    }
}

async fn assemble(conn: &mut SqliteConnection, row: OrderRow) -> DbResult<Order> {
    let lines = sqlx::query_as::<_, OrderLineRow>(
        r#"
        SELECT product_id, quantity, unit_price
        FROM order_lines
        WHERE order_id = ?1
        ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let shipping = sqlx::query_as::<_, ShippingRow>(
        r#"
        SELECT address, phone_number, carrier, fee, estimated_delivery
        FROM shipping_info
        WHERE order_id = ?1
        "#,
    )
    .bind(&row.id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("ShippingInfo", &row.id))?;

    Ok(Order {
        id: row.id,
        customer_id: row.customer_id,
        status: row.status,
        lines: lines.into_iter().map(OrderLine::from).collect(),
        shipping: shipping.into(),
        subtotal: Money::from_minor(row.subtotal),
        discount_amount: Money::from_minor(row.discount_amount),
        shipping_fee: Money::from_minor(row.shipping_fee),
        total_price: Money::from_minor(row.total_price),
        applied_discount_id: row.applied_discount_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
