//! Workflow error types for journal entry lifecycle management.

use thiserror::Error;
use tally_shared::types::Principal;

use crate::workflow::types::EntryStatus;

/// Errors that can occur during workflow transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// The action is not permitted from the current status.
    #[error("Cannot {action} an entry in status {from}")]
    InvalidTransition {
        /// The current status.
        from: EntryStatus,
        /// The attempted action.
        action: &'static str,
    },

    /// The entry's creator tried to approve it.
    #[error("Principal {principal} created this entry and cannot approve it")]
    SelfApproval {
        /// The creator.
        principal: Principal,
    },

    /// The entry's creator tried to reject it.
    #[error("Principal {principal} created this entry and cannot reject it")]
    SelfRejection {
        /// The creator.
        principal: Principal,
    },

    /// The principal is not in the authorized approver set.
    #[error("Principal {principal} is not an authorized approver")]
    Unauthorized {
        /// The principal that attempted the action.
        principal: Principal,
    },

    /// The first approver tried to give the final approval too.
    #[error("Principal {principal} already approved this entry")]
    RepeatApprover {
        /// The repeating approver.
        principal: Principal,
    },

    /// Rejection reason is required but not provided.
    #[error("Rejection reason is required")]
    RejectionReasonRequired,
}

impl WorkflowError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidTransition { .. } => 409,
            Self::RejectionReasonRequired => 400,
            Self::SelfApproval { .. }
            | Self::SelfRejection { .. }
            | Self::Unauthorized { .. }
            | Self::RepeatApprover { .. } => 403,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::SelfApproval { .. } => "SELF_APPROVAL",
            Self::SelfRejection { .. } => "SELF_REJECTION",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::RepeatApprover { .. } => "REPEAT_APPROVER",
            Self::RejectionReasonRequired => "REJECTION_REASON_REQUIRED",
        }
    }
}
