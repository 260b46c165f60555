//! # Database Handle
//!
//! Opens the SQLite file behind the document store and hands out typed
//! repositories.
//!
//! ```text
//! ApiConfig.database ──► DbConfig ──► Database::new
//!                                       │  WAL, migrations/sqlite
//!                                       ▼
//!                          leads() orders() allocations() ... stats()
//!                                       │
//!                                       ▼
//!                             DocumentStore (documents table)
//! ```
//!
//! The API server and the aggregation job share one pool. Writers are
//! serialized by SQLite; WAL lets the report queries read while a bulk upload
//! commits.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::collections;
use crate::repository::allocation::{AllocationRepository, InventoryRepository};
use crate::repository::calendar::{EventRepository, JourneyRepository};
use crate::repository::lead::{ActivityLogRepository, LeadRepository};
use crate::repository::order::{
    BulkUploadRepository, InvoiceRepository, LedgerRepository, OrderRepository, PaymentRepository,
};
use crate::repository::reminder::ReminderRepository;
use crate::repository::stats::StatsRepository;
use crate::repository::team::{TargetRepository, TeamMemberRepository, UserRepository};
use crate::repository::Repository;
use crate::store::DocumentStore;

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives and how many connections to open.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/salesdesk/salesdesk.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    /// Set from `[database] max_connections` in the server config.
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a handler waits for a free connection.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// Defaults for the API server. The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// A private in-memory store for tests. One connection, since each
    /// `:memory:` connection would otherwise see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the store. Clones share the pool.
///
/// ```rust,ignore
/// async fn get_lead(
///     State(state): State<AppState>,
///     Path(id): Path<String>,
/// ) -> ApiResult<ApiResponse<Lead>> {
///     Ok(ApiResponse::success(state.db.leads().get_required(&id).await?))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database file, enables WAL and
    /// applies pending migrations unless `run_migrations` is off.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            // A crash may lose the last committed batch, never corrupt the file
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations from `migrations/sqlite`.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns the raw document store.
    ///
    /// For collections without a typed repository and for batch writes.
    pub fn store(&self) -> DocumentStore {
        DocumentStore::new(self.pool.clone())
    }

    /// Returns the lead repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let same_client = db.leads().find_by_phone("9876543210").await?;
    /// ```
    pub fn leads(&self) -> LeadRepository {
        Repository::new(self.store())
    }

    pub fn activity_logs(&self) -> ActivityLogRepository {
        Repository::new(self.store())
    }

    /// Returns the order repository.
    pub fn orders(&self) -> OrderRepository {
        Repository::new(self.store())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        Repository::new(self.store())
    }

    pub fn payments(&self) -> PaymentRepository {
        Repository::new(self.store())
    }

    pub fn receivables(&self) -> LedgerRepository {
        Repository::with_collection(self.store(), collections::RECEIVABLES)
    }

    pub fn payables(&self) -> LedgerRepository {
        Repository::with_collection(self.store(), collections::PAYABLES)
    }

    pub fn bulk_uploads(&self) -> BulkUploadRepository {
        Repository::new(self.store())
    }

    /// Returns the allocation repository.
    pub fn allocations(&self) -> AllocationRepository {
        Repository::new(self.store())
    }

    pub fn inventory(&self) -> InventoryRepository {
        Repository::new(self.store())
    }

    pub fn reminders(&self) -> ReminderRepository {
        Repository::new(self.store())
    }

    pub fn events(&self) -> EventRepository {
        Repository::new(self.store())
    }

    pub fn journeys(&self) -> JourneyRepository {
        Repository::new(self.store())
    }

    pub fn users(&self) -> UserRepository {
        Repository::new(self.store())
    }

    /// Manually added members of the sales-performance team.
    pub fn sales_members(&self) -> TeamMemberRepository {
        Repository::with_collection(self.store(), collections::SALES_MEMBERS)
    }

    /// Manually added members of the retail-tracker team.
    pub fn retail_members(&self) -> TeamMemberRepository {
        Repository::with_collection(self.store(), collections::RETAIL_MEMBERS)
    }

    pub fn targets(&self) -> TargetRepository {
        Repository::new(self.store())
    }

    /// Returns the stats snapshot repository.
    pub fn stats(&self) -> StatsRepository {
        StatsRepository::new(self.store())
    }

    /// Called once on server shutdown; repositories fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Backs `GET /health`.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[test]
    fn test_server_config_takes_pool_size() {
        let config = DbConfig::new("/tmp/salesdesk-test.db").max_connections(10);
        assert_eq!(config.max_connections, 10);
        assert!(config.run_migrations);
        assert_eq!(DbConfig::in_memory().max_connections, 1);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("salesdesk.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.store()
            .set(collections::EVENTS, "E1", &serde_json::json!({"event_name": "IPL"}))
            .await
            .unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert_eq!(db.events().count().await.unwrap(), 1);
    }
}
