//! Workflow domain types for journal entry lifecycle management.

use serde::{Deserialize, Serialize};
use std::fmt;
use tally_shared::types::Principal;

/// Persisted status of a journal entry.
///
/// The valid transitions are:
/// - Draft → PendingFirstApproval (submit)
/// - PendingFirstApproval → PendingFinalApproval (approve, dual mode)
/// - PendingFirstApproval → Posted (approve, single mode)
/// - PendingFinalApproval → Posted (approve)
/// - PendingFirstApproval | PendingFinalApproval → Rejected (reject)
/// - Posted → Reversed (reverse)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Entry is being drafted and can be modified or deleted.
    Draft,
    /// Submitted, waiting for the first approval.
    PendingFirstApproval,
    /// One approval recorded, waiting for a second distinct approver.
    PendingFinalApproval,
    /// Posted to account balances (immutable).
    Posted,
    /// Rejected by an approver (terminal).
    Rejected,
    /// Cancelled by a reversing entry (terminal).
    Reversed,
}

impl EntryStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingFirstApproval => "pending_first_approval",
            Self::PendingFinalApproval => "pending_final_approval",
            Self::Posted => "posted",
            Self::Rejected => "rejected",
            Self::Reversed => "reversed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending_first_approval" => Some(Self::PendingFirstApproval),
            "pending_final_approval" => Some(Self::PendingFinalApproval),
            "posted" => Some(Self::Posted),
            "rejected" => Some(Self::Rejected),
            "reversed" => Some(Self::Reversed),
            _ => None,
        }
    }

    /// Returns true while the entry waits for an approval.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingFirstApproval | Self::PendingFinalApproval)
    }

    /// Returns true if the entry's lines affect account balances.
    ///
    /// Reversed entries still count: the reversing entry cancels them.
    #[must_use]
    pub fn affects_balances(&self) -> bool {
        matches!(self, Self::Posted | Self::Reversed)
    }

    /// Statuses that block a period close.
    pub const OPEN: [Self; 3] = [
        Self::Draft,
        Self::PendingFirstApproval,
        Self::PendingFinalApproval,
    ];
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry lifecycle state with the data each state carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryState {
    /// Editable draft.
    Draft,
    /// Waiting for the first approval.
    PendingFirstApproval,
    /// Waiting for the final approval.
    PendingFinalApproval {
        /// Who gave the first approval.
        first_approver: Principal,
    },
    /// Posted to the ledger.
    Posted {
        /// Approvers in approval order.
        approvers: Vec<Principal>,
    },
    /// Rejected by an approver.
    Rejected {
        /// Who rejected the entry.
        by: Principal,
        /// Why.
        reason: String,
    },
    /// Cancelled by a reversing entry.
    Reversed {
        /// Who reversed the entry.
        by: Principal,
    },
}

impl EntryState {
    /// Returns the persisted status for this state.
    #[must_use]
    pub fn status(&self) -> EntryStatus {
        match self {
            Self::Draft => EntryStatus::Draft,
            Self::PendingFirstApproval => EntryStatus::PendingFirstApproval,
            Self::PendingFinalApproval { .. } => EntryStatus::PendingFinalApproval,
            Self::Posted { .. } => EntryStatus::Posted,
            Self::Rejected { .. } => EntryStatus::Rejected,
            Self::Reversed { .. } => EntryStatus::Reversed,
        }
    }

    /// Every approver recorded so far, in approval order.
    #[must_use]
    pub fn approvers(&self) -> Vec<&Principal> {
        match self {
            Self::PendingFinalApproval { first_approver } => vec![first_approver],
            Self::Posted { approvers } => approvers.iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// An action requested against an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowAction {
    /// Submit a draft for approval.
    Submit {
        /// Who submits.
        principal: Principal,
    },
    /// Approve a pending entry.
    Approve {
        /// Who approves.
        principal: Principal,
    },
    /// Reject a pending entry.
    Reject {
        /// Who rejects.
        principal: Principal,
        /// Rejection reason (required).
        reason: String,
    },
    /// Mark a posted entry reversed.
    Reverse {
        /// Who reverses.
        principal: Principal,
    },
}

impl WorkflowAction {
    /// Short name of the action, used in error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Reverse { .. } => "reverse",
        }
    }

    /// The principal performing the action.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        match self {
            Self::Submit { principal }
            | Self::Approve { principal }
            | Self::Reject { principal, .. }
            | Self::Reverse { principal } => principal,
        }
    }
}
