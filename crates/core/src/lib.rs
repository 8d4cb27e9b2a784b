//! Core ledger logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here; the
//! `tally-db` crate feeds them what it read inside its transactions.
//!
//! # Modules
//!
//! - `accounts` - Chart of accounts types and balance rules
//! - `ledger` - Double-entry validation and entry construction
//! - `workflow` - Entry state machine, authorization policy and reversals
//! - `audit` - Append-only audit records
//! - `period` - Accounting periods and period locks
//! - `reconciliation` - Bank transaction matching and reconciliation reports
//! - `reports` - Trial balance
//! - `close` - Period close checklist and closing entries

pub mod accounts;
pub mod audit;
pub mod close;
pub mod ledger;
pub mod period;
pub mod reconciliation;
pub mod reports;
pub mod workflow;
