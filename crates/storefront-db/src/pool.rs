//! # Database Handle
//!
//! Opens the checkout database and hands out units of work and repositories.
//!
//! ## Connections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::for_path(path)                                               │
//! │       │   ":memory:" ──► one private connection (tests, demo runs)      │
//! │       │   file       ──► WAL, up to max_connections                     │
//! │       ▼                                                                 │
//! │  Database::new(config) ──► pool + embedded migrations                   │
//! │       │                                                                 │
//! │       ├── db.begin()        ──► UnitOfWork: one connection, one txn     │
//! │       └── db.inventory() .. ──► repositories reading from the pool      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkout writers contend for the single SQLite write lock. Each
//! connection waits up to `busy_timeout` for it, so a burst of orders
//! queues instead of failing with `SQLITE_BUSY`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::discount::DiscountRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::order::OrderRepository;
use crate::repository::payment::PaymentRepository;
use crate::unit_of_work::UnitOfWork;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the checkout database lives and how hard writers may wait.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Default: 5. Always 1 for an in-memory database, which exists only
    /// on the connection that created it.
    pub max_connections: u32,

    /// How long a writer waits for the SQLite write lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,
}

impl DbConfig {
    /// A file-backed database, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// A private in-memory database that disappears with the handle.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// [`in_memory`](Self::in_memory) for `":memory:"`, otherwise [`new`](Self::new).
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.as_os_str() == MEMORY_PATH {
            DbConfig::in_memory()
        } else {
            DbConfig::new(path)
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    /// Ignored for in-memory databases.
    pub fn max_connections(mut self, max: u32) -> Self {
        if !self.is_in_memory() {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        // Deleting an order cascades to its lines, shipping info and payment.
        options.foreign_keys(true).busy_timeout(self.busy_timeout)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the checkout database. Clones share one pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::for_path("./storefront.db")).await?;
///
/// let mut uow = db.begin().await?;
/// db.inventory().reserve(&mut uow, 7, 2, "order placed", "u1", now).await?;
/// uow.commit().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            // An in-memory database dies with its last connection.
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;

        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Checkout database ready"
        );

        Ok(Database { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a unit of work (one transaction on one pooled connection).
    pub async fn begin(&self) -> DbResult<UnitOfWork> {
        UnitOfWork::begin(&self.pool).await
    }

    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    pub fn discounts(&self) -> DiscountRepository {
        DiscountRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    /// Waits for open units of work to finish, then closes every connection.
    pub async fn close(&self) {
        info!("Closing checkout database");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
