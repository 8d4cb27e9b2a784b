//! Double-entry bookkeeping logic.
//!
//! This module implements the core ledger functionality:
//! - Journal entry and line types
//! - Line and balance validation
//! - Document proposal conversion
//! - Error types for ledger operations

pub mod error;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use error::{InvalidAccountReason, LedgerError};
pub use service::LedgerService;
pub use types::{
    AccountInfo, DocumentProposal, EntryFilter, EntryTotals, JournalEntry, JournalLine, LineInput,
    NewEntry, SourceType, fiscal_year_of, format_entry_number,
};
