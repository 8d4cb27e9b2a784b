//! Ledger domain types for journal entry creation and validation.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_shared::types::{AccountId, EntityId, JournalEntryId, JournalLineId, PeriodId, Principal};

use crate::workflow::{EntryState, EntryStatus};

/// Provenance of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Keyed in by a user.
    Manual,
    /// Proposed by the document-extraction collaborator.
    Document,
    /// Created from a bank feed.
    BankImport,
    /// Period-end adjusting entry (depreciation, accruals).
    Adjusting,
    /// Reversal of a posted entry.
    Reversal,
    /// Year-end closing entry.
    Closing,
}

impl SourceType {
    /// Returns the string representation of the source type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Document => "document",
            Self::BankImport => "bank_import",
            Self::Adjusting => "adjusting",
            Self::Reversal => "reversal",
            Self::Closing => "closing",
        }
    }

    /// Parses a source type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "document" => Some(Self::Document),
            "bank_import" => Some(Self::BankImport),
            "adjusting" => Some(Self::Adjusting),
            "reversal" => Some(Self::Reversal),
            "closing" => Some(Self::Closing),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for a single journal line.
///
/// Exactly one of `debit` / `credit` is non-zero and both are non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    /// The account to post to.
    pub account_id: AccountId,
    /// Debit amount (0 if credit).
    pub debit: Decimal,
    /// Credit amount (0 if debit).
    pub credit: Decimal,
    /// Optional line description.
    pub description: Option<String>,
}

impl LineInput {
    /// A debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
        }
    }

    /// A credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
        }
    }

    /// Sets the line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input for creating a draft journal entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Effective date.
    pub entry_date: NaiveDate,
    /// Free-text memo.
    pub memo: String,
    /// Provenance.
    pub source_type: SourceType,
    /// Provenance reference (document id, bank transaction id, ...).
    pub source_id: Option<String>,
    /// Lines in order.
    pub lines: Vec<LineInput>,
    /// The principal creating the entry.
    pub created_by: Principal,
}

impl NewEntry {
    /// A manual entry with the given lines.
    #[must_use]
    pub fn manual(
        entity_id: EntityId,
        entry_date: NaiveDate,
        memo: impl Into<String>,
        lines: Vec<LineInput>,
        created_by: Principal,
    ) -> Self {
        Self {
            entity_id,
            entry_date,
            memo: memo.into(),
            source_type: SourceType::Manual,
            source_id: None,
            lines,
            created_by,
        }
    }

    /// Overrides the provenance.
    #[must_use]
    pub fn with_source(mut self, source_type: SourceType, source_id: Option<String>) -> Self {
        self.source_type = source_type;
        self.source_id = source_id;
        self
    }
}

/// A proposed transaction from the document-extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentProposal {
    /// Identifier of the processed document.
    pub document_id: String,
    /// Gross amount (positive).
    pub amount: Decimal,
    /// Vendor or description.
    pub description: String,
    /// Document date.
    pub date: NaiveDate,
    /// Account the extraction suggests debiting.
    pub suggested_account: AccountId,
}

/// A persisted journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Line id.
    pub id: JournalLineId,
    /// 1-based position within the entry.
    pub line_number: i32,
    /// Account posted to.
    pub account_id: AccountId,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Optional description.
    pub description: Option<String>,
}

impl From<&JournalLine> for LineInput {
    fn from(line: &JournalLine) -> Self {
        Self {
            account_id: line.account_id,
            debit: line.debit,
            credit: line.credit,
            description: line.description.clone(),
        }
    }
}

/// A persisted journal entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry id.
    pub id: JournalEntryId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Human-readable number, unique per entity.
    pub entry_number: i64,
    /// Effective date.
    pub entry_date: NaiveDate,
    /// Fiscal year of the entry date.
    pub fiscal_year: i32,
    /// Accounting period containing the entry date.
    pub period_id: PeriodId,
    /// Memo.
    pub memo: String,
    /// Provenance.
    pub source_type: SourceType,
    /// Provenance reference.
    pub source_id: Option<String>,
    /// Lifecycle state.
    pub state: EntryState,
    /// Creator.
    pub created_by: Principal,
    /// The entry this one reverses, if it is a reversal.
    pub reverses_entry_id: Option<JournalEntryId>,
    /// When the entry was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Lines in order.
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// Current status.
    #[must_use]
    pub fn status(&self) -> EntryStatus {
        self.state.status()
    }

    /// Display number such as `JE-42`.
    #[must_use]
    pub fn display_number(&self) -> String {
        format_entry_number(self.entry_number)
    }

    /// Debit and credit totals.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        EntryTotals::from_amounts(self.lines.iter().map(|l| (l.debit, l.credit)))
    }

    /// Lines as inputs, for building a reversal.
    #[must_use]
    pub fn line_inputs(&self) -> Vec<LineInput> {
        self.lines.iter().map(LineInput::from).collect()
    }
}

/// Formats an entry number for display.
#[must_use]
pub fn format_entry_number(entry_number: i64) -> String {
    format!("JE-{entry_number}")
}

/// Fiscal year of a date (calendar fiscal years).
#[must_use]
pub fn fiscal_year_of(date: NaiveDate) -> i32 {
    date.year()
}

/// Entry debit and credit totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Total debits.
    pub debit: Decimal,
    /// Total credits.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums `(debit, credit)` pairs.
    pub fn from_amounts(amounts: impl IntoIterator<Item = (Decimal, Decimal)>) -> Self {
        amounts.into_iter().fold(
            Self {
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
            },
            |acc, (debit, credit)| Self {
                debit: acc.debit + debit,
                credit: acc.credit + credit,
            },
        )
    }

    /// Whether debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }

    /// Returns the difference between debits and credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Facts about an account needed to validate a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    /// The account ID.
    pub id: AccountId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Whether the account allows posting.
    pub allow_posting: bool,
}

/// Filter options for listing entries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Filter by status.
    pub status: Option<EntryStatus>,
    /// Earliest entry date (inclusive).
    pub date_from: Option<NaiveDate>,
    /// Latest entry date (inclusive).
    pub date_to: Option<NaiveDate>,
    /// Filter by provenance.
    pub source_type: Option<SourceType>,
}
