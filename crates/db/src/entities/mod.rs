//! `SeaORM` entity definitions.
//!
//! Status and type columns hold the string forms defined by `tally-core`
//! (`EntryStatus::as_str`, `AccountType::as_str`, ...) so the same schema
//! runs on `PostgreSQL` and `SQLite`.

pub mod accounting_periods;
pub mod accounts;
pub mod audit_log;
pub mod bank_accounts;
pub mod bank_transactions;
pub mod journal_entries;
pub mod journal_entry_lines;
pub mod period_close_history;
pub mod period_locks;
pub mod reconciliation_reports;
