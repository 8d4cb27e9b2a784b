//! Bank reconciliation engine.
//!
//! - `types` - Bank accounts, transactions, match decisions and reports
//! - `error` - Reconciliation error types
//! - `matching` - Candidate filtering, similarity scoring and match decisions
//! - `report` - Reconciliation report arithmetic

pub mod error;
pub mod matching;
pub mod report;
pub mod types;

#[cfg(test)]
mod matching_props;

pub use error::ReconciliationError;
pub use matching::{MatchingEngine, jaccard_similarity};
pub use report::ReconciliationMath;
pub use types::{
    AutoMatchOutcome, AutoMatchSummary, BankAccount, BankTransaction, BankTransactionInput,
    Candidate, IngestSummary, MatchDecision, MatchSettings, MatchStatus, OutstandingItem,
    ReconciliationReport, ReportFigures, ReviewReason,
};
