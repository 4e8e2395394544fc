//! Persistence Layer
//!
//! SQLite-backed storage for the funding ledger, with async access via sqlx.
//!
//! # Database Schema
//!
//! ## businesses
//! - id, name, owner_id
//! - funding_goal / raised_amount: REAL
//! - status: "open", "funded" or "closed"
//! - total_investors, average_investment
//! - version: optimistic-concurrency token
//!
//! ## investments
//! - id, investor_id, business_id, amount, status
//! - transaction_id: unique
//! - payment_json, terms_json, tracking_json, refund_json
//! - at most one pending/completed row per (investor_id, business_id)
//!
//! ## performances
//! - id, business_id, year, quarter (unique together), status
//! - figures_json, revenue_growth, breakdown_json, review_json
//!
//! ## distributions
//! - id, business_id, performance_id, investor_id, investment_id
//! - unique per (performance_id, investment_id)
//! - year, quarter, status, distribution_type, net_distribution
//! - snapshot_json, approval_json, payout_json, audit_json

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/fundshare.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Enable query logging
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/fundshare.db".to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/fundshare.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let log_queries = std::env::var("DATABASE_LOG_QUERIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(cfg!(debug_assertions));

        Self {
            url,
            max_connections,
            log_queries,
        }
    }

    /// Private in-memory database, mainly for tests
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            log_queries: false,
        }
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Initialize the database connection pool and run migrations
pub async fn init_database(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !config.log_queries {
        options = options.disable_statement_logging();
    }

    // Every connection to sqlite::memory: is its own database, so the pool
    // must hold exactly one connection and never recycle it.
    let pool = if config.is_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?
    };

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

async fn migrate(pool: &DbPool, what: &str, sql: &str) -> Result<(), DatabaseError> {
    sqlx::query(sql)
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create {}: {}", what, e)))?;
    Ok(())
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    migrate(
        pool,
        "businesses table",
        r#"
        CREATE TABLE IF NOT EXISTS businesses (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            funding_goal REAL NOT NULL CHECK(funding_goal > 0),
            raised_amount REAL NOT NULL DEFAULT 0.0 CHECK(raised_amount >= 0),
            status TEXT NOT NULL CHECK(status IN ('open', 'funded', 'closed')),
            total_investors INTEGER NOT NULL DEFAULT 0,
            average_investment REAL NOT NULL DEFAULT 0.0,
            version INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "investments table",
        r#"
        CREATE TABLE IF NOT EXISTS investments (
            id TEXT PRIMARY KEY,
            investor_id TEXT NOT NULL,
            business_id TEXT NOT NULL,
            amount REAL NOT NULL CHECK(amount >= 0),
            status TEXT NOT NULL CHECK(status IN ('pending', 'completed', 'failed', 'refunded')),
            transaction_id TEXT NOT NULL UNIQUE,
            payment_json TEXT NOT NULL,
            terms_json TEXT NOT NULL,
            tracking_json TEXT NOT NULL,
            refund_json TEXT,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (business_id) REFERENCES businesses(id)
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "performances table",
        r#"
        CREATE TABLE IF NOT EXISTS performances (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            quarter INTEGER NOT NULL CHECK(quarter BETWEEN 1 AND 4),
            status TEXT NOT NULL CHECK(status IN ('draft', 'submitted', 'verified', 'approved')),
            figures_json TEXT NOT NULL,
            revenue_growth REAL,
            breakdown_json TEXT NOT NULL,
            review_json TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            UNIQUE (business_id, year, quarter),
            FOREIGN KEY (business_id) REFERENCES businesses(id)
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "distributions table",
        r#"
        CREATE TABLE IF NOT EXISTS distributions (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL,
            performance_id TEXT NOT NULL,
            investor_id TEXT NOT NULL,
            investment_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            quarter INTEGER NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'approved', 'paid', 'failed', 'cancelled')),
            distribution_type TEXT NOT NULL,
            net_distribution REAL NOT NULL,
            snapshot_json TEXT NOT NULL,
            approval_json TEXT,
            payout_json TEXT,
            failure_reason TEXT,
            cancellation_reason TEXT,
            audit_json TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            UNIQUE (performance_id, investment_id),
            FOREIGN KEY (performance_id) REFERENCES performances(id)
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "active investment index",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_investments_active_pair \
         ON investments(investor_id, business_id) WHERE status IN ('pending', 'completed')",
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_investments_business_status ON investments(business_id, status)",
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_distributions_investor ON distributions(investor_id)",
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_distributions_business_period ON distributions(business_id, year, quarter)",
    )
    .await?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database(&DatabaseConfig::in_memory()).await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations() {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('businesses', 'investments', 'performances', 'distributions')"
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 4);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        assert!(run_migrations(&pool).await.is_ok());
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://data/fundshare.db");
        assert_eq!(config.max_connections, 5);
        assert!(DatabaseConfig::in_memory().is_memory());
    }
}
