//! Audit trail vocabulary.
//!
//! Every state change in the ledger appends one audit record in the same
//! database transaction as the change itself. Records are never updated or
//! deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_shared::types::{AuditLogId, EntityId, Principal};
use uuid::Uuid;

/// What kind of record an audit row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A journal entry.
    JournalEntry,
    /// A period lock.
    PeriodLock,
    /// An accounting period (close / reopen).
    AccountingPeriod,
}

impl SubjectKind {
    /// Returns the string representation of the subject kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JournalEntry => "journal_entry",
            Self::PeriodLock => "period_lock",
            Self::AccountingPeriod => "accounting_period",
        }
    }

    /// Parses a subject kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "journal_entry" => Some(Self::JournalEntry),
            "period_lock" => Some(Self::PeriodLock),
            "accounting_period" => Some(Self::AccountingPeriod),
            _ => None,
        }
    }
}

/// The action an audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Entry created as a draft.
    Created,
    /// Draft submitted for approval.
    Submitted,
    /// Approval recorded.
    Approved,
    /// Entry rejected.
    Rejected,
    /// Entry posted to account balances.
    Posted,
    /// Entry reversed by a reversing entry.
    Reversed,
    /// Date range locked.
    Locked,
    /// Date range unlocked.
    Unlocked,
    /// Period closed.
    Closed,
    /// Period reopened.
    Reopened,
}

impl AuditAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Posted => "posted",
            Self::Reversed => "reversed",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }

    /// Parses an action from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "posted" => Some(Self::Posted),
            "reversed" => Some(Self::Reversed),
            "locked" => Some(Self::Locked),
            "unlocked" => Some(Self::Unlocked),
            "closed" => Some(Self::Closed),
            "reopened" => Some(Self::Reopened),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record id.
    pub id: AuditLogId,
    /// Kind of subject.
    pub subject_kind: SubjectKind,
    /// Id of the subject (entry, lock or period).
    pub subject_id: Uuid,
    /// Entity the subject belongs to.
    pub entity_id: EntityId,
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub principal: Principal,
    /// Free-text comment (rejection reason, unlock reason, ...).
    pub comment: Option<String>,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}
