//! Reconciliation domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_shared::config::ReconciliationConfig;
use tally_shared::types::{
    AccountId, BankAccountId, BankTransactionId, EntityId, JournalEntryId, Principal,
    ReconciliationReportId,
};

/// Match status of an ingested bank transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Not linked to any entry.
    Unmatched,
    /// Linked to a posted entry.
    Matched,
    /// Linked and covered by a reconciled report.
    Cleared,
}

impl MatchStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::Matched => "matched",
            Self::Cleared => "cleared",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unmatched" => Some(Self::Unmatched),
            "matched" => Some(Self::Matched),
            "cleared" => Some(Self::Cleared),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bank account tied to a cash account in the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Bank account id.
    pub id: BankAccountId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Display name.
    pub name: String,
    /// The GL cash account mirroring this bank account.
    pub gl_account_id: AccountId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A raw transaction from the bank-sync collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransactionInput {
    /// The bank's id for the transaction (idempotency key).
    pub external_id: String,
    /// Transaction date.
    pub date: NaiveDate,
    /// Signed amount: positive is an inflow.
    pub amount: Decimal,
    /// Bank description.
    pub description: String,
}

/// Outcome of one ingest call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Newly stored transactions.
    pub inserted: usize,
    /// Transactions skipped because their external id was already known.
    pub duplicates: usize,
}

/// A stored bank transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Transaction id.
    pub id: BankTransactionId,
    /// Bank account.
    pub bank_account_id: BankAccountId,
    /// The bank's id.
    pub external_id: String,
    /// Transaction date.
    pub transaction_date: NaiveDate,
    /// Signed amount.
    pub amount: Decimal,
    /// Bank description.
    pub description: String,
    /// Match status.
    pub match_status: MatchStatus,
    /// Linked entry, if matched.
    pub matched_entry_id: Option<JournalEntryId>,
    /// Match confidence (1 for manual matches).
    pub match_confidence: Option<Decimal>,
    /// Who matched it; `None` for automatic matches.
    pub matched_by: Option<Principal>,
    /// When it was matched.
    pub matched_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token.
    pub version: i64,
}

/// A posted entry considered for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Entry id.
    pub entry_id: JournalEntryId,
    /// Entry date.
    pub entry_date: NaiveDate,
    /// Entry memo.
    pub memo: String,
    /// Total of the debit side (equal to the credit side).
    pub total: Decimal,
    /// Bank transaction already linked to the entry, if any.
    pub linked_transaction: Option<BankTransactionId>,
}

/// Auto-matching thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Days either side of the transaction date.
    pub date_window_days: i64,
    /// Maximum amount difference.
    pub amount_tolerance: Decimal,
    /// Minimum similarity when choosing among several candidates.
    pub similarity_threshold: Decimal,
    /// Lead over the runner-up the best candidate must exceed.
    pub ambiguity_margin: Decimal,
    /// Confidence below which a match is only suggested.
    pub auto_match_floor: Decimal,
    /// Confidence for a lone candidate.
    pub single_candidate_confidence: Decimal,
}

impl From<&ReconciliationConfig> for MatchSettings {
    fn from(config: &ReconciliationConfig) -> Self {
        Self {
            date_window_days: config.date_window_days,
            amount_tolerance: config.amount_tolerance,
            similarity_threshold: config.similarity_threshold,
            ambiguity_margin: config.ambiguity_margin,
            auto_match_floor: config.auto_match_floor,
            single_candidate_confidence: config.single_candidate_confidence,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self::from(&ReconciliationConfig::default())
    }
}

/// Why a transaction needs a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReviewReason {
    /// Nothing in the window matches the amount.
    NoCandidates,
    /// Several candidates and none clearly best.
    Ambiguous {
        /// The competing entries.
        candidates: Vec<JournalEntryId>,
    },
    /// The chosen entry changed before the match could be committed.
    PreconditionFailed {
        /// The entry that was chosen.
        entry_id: JournalEntryId,
        /// What changed.
        detail: String,
    },
}

/// What the engine decided for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum MatchDecision {
    /// Confident enough to link automatically.
    Match {
        /// Chosen entry.
        entry_id: JournalEntryId,
        /// Confidence score.
        confidence: Decimal,
    },
    /// A single best candidate below the auto-match floor.
    Suggest {
        /// Suggested entry.
        entry_id: JournalEntryId,
        /// Confidence score.
        confidence: Decimal,
    },
    /// Left unmatched for manual review.
    Review(ReviewReason),
}

/// Per-transaction outcome of an auto-match run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMatchOutcome {
    /// The bank transaction.
    pub transaction_id: BankTransactionId,
    /// The decision applied to it.
    pub decision: MatchDecision,
}

/// Summary of an auto-match run over one bank account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMatchSummary {
    /// Transactions linked automatically.
    pub matched: Vec<AutoMatchOutcome>,
    /// Transactions with a suggestion awaiting confirmation.
    pub suggested: Vec<AutoMatchOutcome>,
    /// Transactions left for manual review.
    pub review: Vec<AutoMatchOutcome>,
}

impl AutoMatchSummary {
    /// Files an outcome under its decision.
    pub fn record(&mut self, outcome: AutoMatchOutcome) {
        match outcome.decision {
            MatchDecision::Match { .. } => self.matched.push(outcome),
            MatchDecision::Suggest { .. } => self.suggested.push(outcome),
            MatchDecision::Review(_) => self.review.push(outcome),
        }
    }
}

/// A posted cash movement not yet seen on the bank statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingItem {
    /// Entry id.
    pub entry_id: JournalEntryId,
    /// Entry number.
    pub entry_number: i64,
    /// Entry date.
    pub entry_date: NaiveDate,
    /// Entry memo.
    pub memo: String,
    /// Absolute amount.
    pub amount: Decimal,
}

/// Computed reconciliation figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFigures {
    /// Sum of outstanding deposits.
    pub outstanding_deposits_total: Decimal,
    /// Sum of outstanding checks.
    pub outstanding_checks_total: Decimal,
    /// Statement balance + deposits - checks.
    pub adjusted_bank_balance: Decimal,
    /// GL balance - adjusted bank balance.
    pub difference: Decimal,
    /// Whether the difference is below the tolerance.
    pub is_reconciled: bool,
}

/// An immutable reconciliation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Report id.
    pub id: ReconciliationReportId,
    /// Bank account.
    pub bank_account_id: BankAccountId,
    /// First day covered.
    pub period_start: NaiveDate,
    /// As-of date.
    pub period_end: NaiveDate,
    /// Statement ending balance.
    pub statement_balance: Decimal,
    /// GL ending balance of the cash account.
    pub gl_balance: Decimal,
    /// Outstanding deposits.
    pub outstanding_deposits: Vec<OutstandingItem>,
    /// Outstanding checks.
    pub outstanding_checks: Vec<OutstandingItem>,
    /// Computed figures.
    pub figures: ReportFigures,
    /// Who generated the report.
    pub prepared_by: Principal,
    /// When it was generated.
    pub created_at: DateTime<Utc>,
}
