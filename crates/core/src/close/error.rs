//! Period close error types.

use tally_shared::types::{AccountId, PeriodId};
use thiserror::Error;

use super::types::ChecklistFailure;
use crate::ledger::LedgerError;
use crate::period::PeriodError;

/// Errors that can occur closing or reopening a period.
#[derive(Debug, Error)]
pub enum CloseError {
    /// Checklist items failed and the close was not forced.
    #[error("Close checklist incomplete for period {period_id}: {} item(s) failing", failures.len())]
    ChecklistIncomplete {
        /// The period.
        period_id: PeriodId,
        /// The failing items.
        failures: Vec<ChecklistFailure>,
    },

    /// The retained earnings account cannot take the closing entry.
    #[error("Account {account_id} cannot receive the closing entry: {reason}")]
    InvalidRetainedEarnings {
        /// The account.
        account_id: AccountId,
        /// Why.
        reason: &'static str,
    },

    /// Period or lock failure.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// Closing entry failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl CloseError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ChecklistIncomplete { .. } => "CHECKLIST_INCOMPLETE",
            Self::InvalidRetainedEarnings { .. } => "INVALID_ACCOUNT",
            Self::Period(e) => e.error_code(),
            Self::Ledger(e) => e.error_code(),
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::ChecklistIncomplete { .. } | Self::InvalidRetainedEarnings { .. } => 422,
            Self::Period(e) => e.http_status_code(),
            Self::Ledger(e) => e.http_status_code(),
            Self::Database(_) => 500,
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Period(e) => e.is_retryable(),
            Self::Ledger(e) => e.is_retryable(),
            _ => false,
        }
    }
}
