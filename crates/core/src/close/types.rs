//! Close checklist and history types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_shared::types::{
    AccountId, BankAccountId, CloseRecordId, EntityId, JournalEntryId, PeriodId, PeriodLockId,
    Principal,
};

use crate::period::AccountingPeriod;

/// The four close checklist items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItem {
    /// Every bank account has a reconciled report for the period.
    BankReconciliation,
    /// No draft or pending entries dated inside the period.
    EntriesPosted,
    /// Debit-normal and credit-normal balances agree.
    TrialBalance,
    /// Depreciation adjusting entries are posted.
    Depreciation,
}

impl ChecklistItem {
    /// All items in evaluation order.
    pub const ALL: [Self; 4] = [
        Self::BankReconciliation,
        Self::EntriesPosted,
        Self::TrialBalance,
        Self::Depreciation,
    ];

    /// Returns the string representation of the item.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankReconciliation => "bank_reconciliation",
            Self::EntriesPosted => "entries_posted",
            Self::TrialBalance => "trial_balance",
            Self::Depreciation => "depreciation",
        }
    }
}

impl fmt::Display for ChecklistItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a checklist item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum ChecklistFailure {
    /// Bank accounts without a reconciled report covering the period.
    UnreconciledBankAccounts {
        /// The bank accounts.
        bank_account_ids: Vec<BankAccountId>,
    },
    /// Entries still in draft or awaiting approval.
    OpenEntries {
        /// The entries.
        entry_ids: Vec<JournalEntryId>,
    },
    /// The trial balance does not balance.
    TrialBalanceOutOfBalance {
        /// Sum of debit-normal balances.
        debit_total: Decimal,
        /// Sum of credit-normal balances.
        credit_total: Decimal,
    },
    /// Accounts requiring depreciation with no posted adjusting entry.
    MissingDepreciation {
        /// The accounts.
        account_ids: Vec<AccountId>,
    },
}

impl ChecklistFailure {
    /// The item this failure belongs to.
    #[must_use]
    pub fn item(&self) -> ChecklistItem {
        match self {
            Self::UnreconciledBankAccounts { .. } => ChecklistItem::BankReconciliation,
            Self::OpenEntries { .. } => ChecklistItem::EntriesPosted,
            Self::TrialBalanceOutOfBalance { .. } => ChecklistItem::TrialBalance,
            Self::MissingDepreciation { .. } => ChecklistItem::Depreciation,
        }
    }
}

/// Result of one checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    /// The item.
    pub item: ChecklistItem,
    /// Failure details; `None` when the item passed.
    pub failure: Option<ChecklistFailure>,
}

impl ItemResult {
    /// Whether the item passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// A full checklist evaluation for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    /// The period evaluated.
    pub period_id: PeriodId,
    /// Per-item results in evaluation order.
    pub items: Vec<ItemResult>,
    /// Trial balance debit-normal total at evaluation time.
    pub debit_total: Decimal,
    /// Trial balance credit-normal total at evaluation time.
    pub credit_total: Decimal,
}

impl Checklist {
    /// Whether every item passed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(ItemResult::passed)
    }

    /// The failures of the items that did not pass.
    #[must_use]
    pub fn failures(&self) -> Vec<ChecklistFailure> {
        self.items
            .iter()
            .filter_map(|r| r.failure.clone())
            .collect()
    }
}

/// A reconciliation report as seen by the checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCoverage {
    /// Bank account reported on.
    pub bank_account_id: BankAccountId,
    /// First day covered.
    pub period_start: NaiveDate,
    /// As-of date.
    pub period_end: NaiveDate,
    /// Whether the report reconciled.
    pub is_reconciled: bool,
}

/// Options for closing a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOptions {
    /// Close even when checklist items fail.
    pub force: bool,
    /// When set, a closing entry moves revenue and expense activity into this
    /// retained earnings account.
    pub retained_earnings: Option<AccountId>,
}

/// Close history action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseAction {
    /// The period was closed.
    Closed,
    /// The period was reopened.
    Reopened,
}

impl CloseAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }

    /// Parses an action from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "closed" => Some(Self::Closed),
            "reopened" => Some(Self::Reopened),
            _ => None,
        }
    }
}

/// One row of a period's close history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRecord {
    /// Record id.
    pub id: CloseRecordId,
    /// The period.
    pub period_id: PeriodId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Close or reopen.
    pub action: CloseAction,
    /// Who acted.
    pub principal: Principal,
    /// Reopen reason.
    pub reason: Option<String>,
    /// Whether a close bypassed failing checklist items.
    pub forced: bool,
    /// Checklist snapshot taken at close time.
    pub checklist: Option<Checklist>,
    /// Closing entry created by the close, if any.
    pub closing_entry_id: Option<JournalEntryId>,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

/// Result of a successful close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    /// The period after closing.
    pub period: AccountingPeriod,
    /// Checklist evaluated by the close.
    pub checklist: Checklist,
    /// Lock created over the period.
    pub lock_id: PeriodLockId,
    /// Closing entry, when requested and non-empty.
    pub closing_entry_id: Option<JournalEntryId>,
    /// Whether failing items were overridden.
    pub forced: bool,
}
