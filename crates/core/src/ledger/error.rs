//! Ledger error types for validation and state errors.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use tally_shared::types::{AccountId, EntityId, JournalEntryId};
use thiserror::Error;
use uuid::Uuid;

use crate::workflow::{EntryStatus, WorkflowError};

/// Why a line's account was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAccountReason {
    /// No such account.
    NotFound,
    /// The account belongs to another entity.
    ForeignEntity,
    /// Header/subtotal account that does not allow posting.
    NonPosting,
}

impl fmt::Display for InvalidAccountReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "account does not exist",
            Self::ForeignEntity => "account belongs to another entity",
            Self::NonPosting => "account does not allow posting",
        })
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry debits and credits differ.
    #[error("Entry for entity {entity_id} is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// The entity the entry belongs to.
        entity_id: EntityId,
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Entry has no lines or only zero amounts.
    #[error("Entry {entry_id} has no non-zero lines")]
    EmptyEntry {
        /// The empty entry.
        entry_id: JournalEntryId,
    },

    /// A line's amounts are malformed.
    #[error("Line {line_number} is invalid: {reason}")]
    InvalidLine {
        /// 1-based position of the line in the entry.
        line_number: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A line references an account that cannot be posted to.
    #[error("Invalid account {account_id}: {reason}")]
    InvalidAccount {
        /// The referenced account.
        account_id: AccountId,
        /// Why it was refused.
        reason: InvalidAccountReason,
    },

    // ========== Period Errors ==========
    /// The date falls inside a locked period.
    #[error("Period is locked for entity {entity_id} on {date}")]
    PeriodLocked {
        /// The entity.
        entity_id: EntityId,
        /// The effective date refused.
        date: NaiveDate,
    },

    /// No accounting period covers the date.
    #[error("No accounting period for entity {entity_id} covers {date}")]
    NoPeriod {
        /// The entity.
        entity_id: EntityId,
        /// The entry date.
        date: NaiveDate,
    },

    // ========== Lookup Errors ==========
    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account number already used within the entity.
    #[error("Account number {number} already exists for entity {entity_id}")]
    DuplicateAccountNumber {
        /// The entity.
        entity_id: EntityId,
        /// The duplicated number.
        number: String,
    },

    // ========== Entry State Errors ==========
    /// Only draft entries can be deleted or edited.
    #[error("Entry {entry_id} is {status}; only draft entries can be changed")]
    CanOnlyDeleteDraft {
        /// The entry.
        entry_id: JournalEntryId,
        /// Its current status.
        status: EntryStatus,
    },

    /// A workflow rule refused the transition.
    #[error("Entry {entry_id}: {source}")]
    Workflow {
        /// The entry.
        entry_id: JournalEntryId,
        /// The refused transition.
        #[source]
        source: WorkflowError,
    },

    // ========== Concurrency Errors ==========
    /// A version check failed; the caller may retry.
    #[error("Concurrent modification of {resource} {id}, please retry")]
    ConcurrentModification {
        /// Kind of row that changed underneath us.
        resource: &'static str,
        /// Its id.
        id: Uuid,
    },

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    /// Wraps a workflow error with the entry it concerns.
    #[must_use]
    pub fn workflow(entry_id: JournalEntryId, source: WorkflowError) -> Self {
        Self::Workflow { entry_id, source }
    }

    /// Version conflict on a journal entry row.
    #[must_use]
    pub fn entry_conflict(entry_id: JournalEntryId) -> Self {
        Self::ConcurrentModification {
            resource: "journal entry",
            id: entry_id.into_inner(),
        }
    }

    /// Version conflict on an account row.
    #[must_use]
    pub fn account_conflict(account_id: AccountId) -> Self {
        Self::ConcurrentModification {
            resource: "account",
            id: account_id.into_inner(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unbalanced { .. } => "UNBALANCED",
            Self::EmptyEntry { .. } => "EMPTY_ENTRY",
            Self::InvalidLine { .. } => "INVALID_LINE",
            Self::InvalidAccount { .. } => "INVALID_ACCOUNT",
            Self::PeriodLocked { .. } => "PERIOD_LOCKED",
            Self::NoPeriod { .. } => "NO_PERIOD",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::DuplicateAccountNumber { .. } => "DUPLICATE_ACCOUNT_NUMBER",
            Self::CanOnlyDeleteDraft { .. } => "CAN_ONLY_DELETE_DRAFT",
            Self::Workflow { source, .. } => source.error_code(),
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidLine { .. } | Self::CanOnlyDeleteDraft { .. } => 400,

            // 404 Not Found
            Self::EntryNotFound(_) | Self::AccountNotFound(_) => 404,

            // 409 Conflict
            Self::DuplicateAccountNumber { .. } | Self::ConcurrentModification { .. } => 409,

            // 422 Unprocessable Entity - ledger rules
            Self::Unbalanced { .. }
            | Self::EmptyEntry { .. }
            | Self::InvalidAccount { .. }
            | Self::NoPeriod { .. } => 422,

            // 423 Locked
            Self::PeriodLocked { .. } => 423,

            Self::Workflow { source, .. } => source.http_status_code(),

            Self::Database(_) => 500,
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}
