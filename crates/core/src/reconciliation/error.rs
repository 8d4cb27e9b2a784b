//! Reconciliation error types.

use rust_decimal::Decimal;
use thiserror::Error;
use tally_shared::types::{
    AccountId, BankAccountId, BankTransactionId, JournalEntryId, ReconciliationReportId,
};

use crate::ledger::InvalidAccountReason;
use crate::workflow::EntryStatus;

/// Reconciliation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// Entry total does not match the transaction amount.
    #[error(
        "Transaction {transaction_id} amount {transaction_amount} does not match entry {entry_id} total {entry_total}"
    )]
    AmountMismatch {
        /// Transaction.
        transaction_id: BankTransactionId,
        /// Entry.
        entry_id: JournalEntryId,
        /// Absolute transaction amount.
        transaction_amount: Decimal,
        /// Entry total.
        entry_total: Decimal,
    },

    /// The transaction is already linked.
    #[error("Transaction {transaction_id} is already matched to entry {entry_id}")]
    AlreadyMatched {
        /// Transaction.
        transaction_id: BankTransactionId,
        /// Entry it is linked to.
        entry_id: JournalEntryId,
    },

    /// The entry is already linked to another transaction.
    #[error("Entry {entry_id} is already matched to transaction {transaction_id}")]
    EntryAlreadyMatched {
        /// Entry.
        entry_id: JournalEntryId,
        /// Transaction it is linked to.
        transaction_id: BankTransactionId,
    },

    /// Only posted entries can be matched.
    #[error("Entry {entry_id} is {status}; only posted entries can be matched")]
    EntryNotPosted {
        /// Entry.
        entry_id: JournalEntryId,
        /// Its current status.
        status: EntryStatus,
    },

    /// Entry and bank account belong to different entities.
    #[error("Entry {entry_id} belongs to a different entity than transaction {transaction_id}")]
    EntityMismatch {
        /// Transaction.
        transaction_id: BankTransactionId,
        /// Entry.
        entry_id: JournalEntryId,
    },

    /// Transaction not found.
    #[error("Bank transaction not found: {0}")]
    TransactionNotFound(BankTransactionId),

    /// Bank account not found.
    #[error("Bank account not found: {0}")]
    BankAccountNotFound(BankAccountId),

    /// Entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Reconciliation report not found.
    #[error("Reconciliation report not found: {0}")]
    ReportNotFound(ReconciliationReportId),

    /// The GL account cannot back a bank account.
    #[error("Account {account_id} cannot back a bank account: {reason}")]
    InvalidGlAccount {
        /// Account.
        account_id: AccountId,
        /// Why.
        reason: InvalidAccountReason,
    },

    /// Report period is inverted.
    #[error("Invalid report period: {start} to {end}")]
    InvalidPeriod {
        /// Start.
        start: chrono::NaiveDate,
        /// End.
        end: chrono::NaiveDate,
    },

    /// The transaction changed underneath the caller.
    #[error("Bank transaction {0} was modified concurrently")]
    ConcurrentModification(BankTransactionId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl ReconciliationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::AlreadyMatched { .. } => "ALREADY_MATCHED",
            Self::EntryAlreadyMatched { .. } => "ENTRY_ALREADY_MATCHED",
            Self::EntryNotPosted { .. } => "ENTRY_NOT_POSTED",
            Self::EntityMismatch { .. } => "ENTITY_MISMATCH",
            Self::TransactionNotFound(_)
            | Self::BankAccountNotFound(_)
            | Self::EntryNotFound(_)
            | Self::ReportNotFound(_) => "NOT_FOUND",
            Self::InvalidGlAccount { .. } => "INVALID_ACCOUNT",
            Self::InvalidPeriod { .. } => "INVALID_DATE_RANGE",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::TransactionNotFound(_)
            | Self::BankAccountNotFound(_)
            | Self::EntryNotFound(_)
            | Self::ReportNotFound(_) => 404,
            Self::AlreadyMatched { .. }
            | Self::EntryAlreadyMatched { .. }
            | Self::ConcurrentModification(_) => 409,
            Self::InvalidPeriod { .. } => 400,
            Self::AmountMismatch { .. }
            | Self::EntryNotPosted { .. }
            | Self::EntityMismatch { .. }
            | Self::InvalidGlAccount { .. } => 422,
            Self::Database(_) => 500,
        }
    }

    /// Whether retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}
