//! # Discount Code Repository
//!
//! Storage for one-shot discount codes and their atomic consumption.
//!
//! ## Claiming a Code
//! ```text
//! UPDATE discount_codes SET used = 1 WHERE code = ? AND used = 0
//!      │
//!      ├── 1 row  ──► this unit of work owns the code
//!      │               evaluate window + minimum against the pre-claim row
//!      │               (a failure rolls the claim back with the order)
//!      │
//!      └── 0 rows ──► SELECT: no row ──► UnknownCode
//!                            row    ──► AlreadyUsed
//! ```
//!
//! Of N concurrent orders using the same code, exactly one claim succeeds.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::unit_of_work::UnitOfWork;
use storefront_core::validation::validate_discount_percentage;
use storefront_core::{discount, DiscountCode, DiscountError, Money};

#[derive(Debug, sqlx::FromRow)]
struct DiscountCodeRow {
    id: String,
    code: String,
    discount_percentage: i64,
    min_order_value: i64,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    used: bool,
}

impl From<DiscountCodeRow> for DiscountCode {
    fn from(row: DiscountCodeRow) -> Self {
        DiscountCode {
            id: row.id,
            code: row.code,
            // CHECK constraint keeps this in 0..=100
            discount_percentage: row.discount_percentage.clamp(0, 100) as u32,
            min_order_value: Money::from_minor(row.min_order_value),
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            used: row.used,
        }
    }
}

const SELECT_CODE: &str = r#"
    SELECT id, code, discount_percentage, min_order_value, valid_from, valid_to, used
    FROM discount_codes
    WHERE code = ?1
"#;

/// A code consumed by an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedDiscount {
    pub discount_id: String,
    pub amount: Money,
}

/// Repository for discount codes.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Registers a new code.
    pub async fn create_code(&self, code: &DiscountCode) -> DbResult<()> {
        validate_discount_percentage(code.discount_percentage)?;

        sqlx::query(
            r#"
            INSERT INTO discount_codes (
                id, code, discount_percentage, min_order_value, valid_from, valid_to, used
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&code.id)
        .bind(&code.code)
        .bind(code.discount_percentage as i64)
        .bind(code.min_order_value.minor_units())
        .bind(code.valid_from)
        .bind(code.valid_to)
        .bind(code.used)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("discount_codes.code", code.code.clone()),
            other => other,
        })?;

        info!(code = %code.code, pct = code.discount_percentage, "Discount code created");
        Ok(())
    }

    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<DiscountCode>> {
        let row = sqlx::query_as::<_, DiscountCodeRow>(SELECT_CODE)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(DiscountCode::from))
    }

    /// Consumes `code` for an order with the given subtotal.
    ///
    /// ## Errors
    /// `Core(Discount(..))` with, in check order: `UnknownCode`,
    /// `AlreadyUsed`, `NotYetValid`, `Expired`, `BelowMinimum`. The claim is
    /// staged in `uow`; on any error the caller must roll back.
    pub async fn claim(
        &self,
        uow: &mut UnitOfWork,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> DbResult<ClaimedDiscount> {
        let conn = uow.conn();

        let claimed = sqlx::query("UPDATE discount_codes SET used = 1 WHERE code = ?1 AND used = 0")
            .bind(code)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let row = sqlx::query_as::<_, DiscountCodeRow>(SELECT_CODE)
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DiscountError::UnknownCode(code.to_string()))?;

        if claimed == 0 {
            return Err(DiscountError::AlreadyUsed(code.to_string()).into());
        }

        // Evaluate the row as it was before this unit of work claimed it.
        let offer = DiscountCode {
            used: false,
            ..DiscountCode::from(row)
        };
        let amount = discount::evaluate(&offer, subtotal, now)?;

        debug!(code, discount_id = %offer.id, amount = %amount, "Discount code claimed");
        Ok(ClaimedDiscount {
            discount_id: offer.id,
            amount,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use storefront_core::CoreError;

    fn sale10(now: DateTime<Utc>) -> DiscountCode {
        DiscountCode {
            id: "d-1".to_string(),
            code: "SALE10".to_string(),
            discount_percentage: 10,
            min_order_value: Money::from_major(1_000_000),
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            used: false,
        }
    }

    async fn setup(now: DateTime<Utc>) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.discounts().create_code(&sale10(now)).await.unwrap();
        db
    }

    fn discount_err(err: DbError) -> DiscountError {
        match err {
            DbError::Core(CoreError::Discount(e)) => e,
            other => panic!("expected a discount error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_once() {
        let now = Utc::now();
        let db = setup(now).await;
        let discounts = db.discounts();

        let mut uow = db.begin().await.unwrap();
        let claimed = discounts
            .claim(&mut uow, "SALE10", Money::from_major(2_200_000), now)
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(claimed.amount, Money::from_major(220_000));
        assert_eq!(claimed.discount_id, "d-1");
        assert!(discounts.find_by_code("SALE10").await.unwrap().unwrap().used);

        let mut uow = db.begin().await.unwrap();
        let err = discounts
            .claim(&mut uow, "SALE10", Money::from_major(2_200_000), now)
            .await
            .unwrap_err();
        assert_eq!(discount_err(err), DiscountError::AlreadyUsed("SALE10".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let now = Utc::now();
        let db = setup(now).await;
        let mut uow = db.begin().await.unwrap();
        let err = db
            .discounts()
            .claim(&mut uow, "NOPE", Money::from_major(2_200_000), now)
            .await
            .unwrap_err();
        assert_eq!(discount_err(err), DiscountError::UnknownCode("NOPE".to_string()));
    }

    #[tokio::test]
    async fn test_failed_evaluation_rolls_back_claim() {
        let now = Utc::now();
        let db = setup(now).await;
        let discounts = db.discounts();

        let mut uow = db.begin().await.unwrap();
        let err = discounts
            .claim(&mut uow, "SALE10", Money::from_major(500_000), now)
            .await
            .unwrap_err();
        uow.rollback().await.unwrap();

        assert!(matches!(discount_err(err), DiscountError::BelowMinimum { .. }));
        assert!(!discounts.find_by_code("SALE10").await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_expired_code() {
        let now = Utc::now();
        let db = setup(now).await;
        let mut uow = db.begin().await.unwrap();
        let err = db
            .discounts()
            .claim(&mut uow, "SALE10", Money::from_major(2_200_000), now + Duration::days(2))
            .await
            .unwrap_err();
        assert!(matches!(discount_err(err), DiscountError::Expired { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_code() {
        let now = Utc::now();
        let db = setup(now).await;
        let mut again = sale10(now);
        again.id = "d-2".to_string();
        let err = db.discounts().create_code(&again).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_percentage() {
        let now = Utc::now();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut code = sale10(now);
        code.discount_percentage = 150;
        assert!(matches!(
            db.discounts().create_code(&code).await,
            Err(DbError::Core(CoreError::Validation(_)))
        ));
    }
}
