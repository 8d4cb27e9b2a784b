//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Every mutating method runs in one database transaction; dropping the
//! future before it returns rolls the transaction back.

pub mod account;
pub mod audit;
pub mod close;
pub mod ledger;
pub mod period;
pub mod reconciliation;

pub use account::AccountRepository;
pub use audit::AuditRepository;
pub use close::CloseRepository;
pub use ledger::{LedgerRepository, ReversalOutcome};
pub use period::PeriodRepository;
pub use reconciliation::ReconciliationRepository;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DbErr, SqlErr};
use tally_shared::types::Principal;

/// Current time as stored in timestamp columns.
pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

/// Converts a stored timestamp back to UTC.
pub(crate) fn utc(ts: DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

/// Normalizes a stored money amount.
///
/// `SQLite` keeps decimals as REAL; amounts are validated to the cent before
/// they are written, so rounding on read restores the exact value.
pub(crate) fn money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Error for a column holding a value the domain does not recognise.
pub(crate) fn corrupt(column: &str, value: &str) -> DbErr {
    DbErr::Type(format!("unexpected {column} value {value:?}"))
}

/// Parses a stored principal.
pub(crate) fn principal(column: &str, value: &str) -> Result<Principal, DbErr> {
    Principal::new(value).map_err(|_| corrupt(column, value))
}

/// Parses an optional stored principal.
pub(crate) fn optional_principal(
    column: &str,
    value: Option<&str>,
) -> Result<Option<Principal>, DbErr> {
    value.map(|v| principal(column, v)).transpose()
}

/// Whether the error is a unique index violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
