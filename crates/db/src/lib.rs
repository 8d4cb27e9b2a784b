//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository implementations for the ledger, periods, reconciliation and close
//! - Database migrations
//!
//! Both `PostgreSQL` and `SQLite` are supported; the tests run against an
//! in-memory `SQLite` database.

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    AccountRepository, AuditRepository, CloseRepository, LedgerRepository, PeriodRepository,
    ReconciliationRepository, ReversalOutcome,
};

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tally_shared::config::DatabaseConfig;

/// Establishes a connection pool to the configured database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
