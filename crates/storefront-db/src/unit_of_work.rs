//! # Unit of Work
//!
//! One SQLite transaction that repositories stage mutations into.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = db.begin().await?;                                       │
//! │                                                                         │
//! │  inventory.reserve(&mut uow, ...)  ─┐                                   │
//! │  discounts.claim(&mut uow, ...)     ├─ all staged in one transaction    │
//! │  orders.insert(&mut uow, ...)       │                                   │
//! │  payments.insert(&mut uow, ...)    ─┘                                   │
//! │                                                                         │
//! │  uow.commit().await?      ──► everything is visible                     │
//! │  (error / early return)   ──► dropped, everything rolls back            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write First
//! A unit of work must open with a write statement. SQLite then takes the
//! write lock up front (waiting on the busy timeout), instead of failing with
//! `SQLITE_BUSY` when a read transaction tries to upgrade while another
//! writer holds the lock. Every repository method that takes a unit of work
//! starts with its conditional `UPDATE` or an `INSERT`.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// An open transaction. Dropping it without [`commit`](Self::commit) rolls
/// back every staged mutation.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work opened");
        Ok(UnitOfWork { tx })
    }

    /// The transaction's connection, for repository queries.
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Rolls back now rather than on drop, so the connection is clean before
    /// the caller touches the pool again.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").finish_non_exhaustive()
    }
}
