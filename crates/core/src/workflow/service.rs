//! Workflow service for journal entry state transitions.
//!
//! `WorkflowService::transition` is the only way an entry changes state. It
//! pattern-matches on `(state, action)`; any pair not listed is rejected with
//! `WorkflowError::InvalidTransition`.

use tally_shared::types::Principal;

use crate::audit::AuditAction;
use crate::workflow::error::WorkflowError;
use crate::workflow::policy::{ApprovalMode, AuthorizationPolicy};
use crate::workflow::types::{EntryState, WorkflowAction};

/// Facts about the entry that the transition rules need.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    /// The entry's creator.
    pub created_by: &'a Principal,
    /// The authorization policy supplied by the caller.
    pub policy: &'a AuthorizationPolicy,
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The state the entry moves to.
    pub next: EntryState,
    /// Audit actions to append, in order.
    pub audit: Vec<AuditAction>,
}

impl Transition {
    fn new(next: EntryState, audit: Vec<AuditAction>) -> Self {
        Self { next, audit }
    }

    /// Returns true if this transition posts the entry to account balances.
    #[must_use]
    pub fn posts(&self) -> bool {
        matches!(self.next, EntryState::Posted { .. })
    }
}

/// Stateless service for journal entry workflow transitions.
pub struct WorkflowService;

impl WorkflowService {
    /// Applies `action` to `state`.
    ///
    /// Approval checks run in a fixed order: the current state, then the
    /// creator, then the allow-list, then repeat approval.
    ///
    /// # Errors
    ///
    /// Returns a `WorkflowError` describing the first rule the action breaks.
    pub fn transition(
        state: &EntryState,
        action: &WorkflowAction,
        ctx: TransitionContext<'_>,
    ) -> Result<Transition, WorkflowError> {
        match (state, action) {
            (EntryState::Draft, WorkflowAction::Submit { .. }) => Ok(Transition::new(
                EntryState::PendingFirstApproval,
                vec![AuditAction::Submitted],
            )),

            (EntryState::PendingFirstApproval, WorkflowAction::Approve { principal }) => {
                Self::check_approver(principal, ctx)?;
                match ctx.policy.mode() {
                    ApprovalMode::Single => Ok(Transition::new(
                        EntryState::Posted {
                            approvers: vec![principal.clone()],
                        },
                        vec![AuditAction::Approved, AuditAction::Posted],
                    )),
                    ApprovalMode::Dual => Ok(Transition::new(
                        EntryState::PendingFinalApproval {
                            first_approver: principal.clone(),
                        },
                        vec![AuditAction::Approved],
                    )),
                }
            }

            (
                EntryState::PendingFinalApproval { first_approver },
                WorkflowAction::Approve { principal },
            ) => {
                Self::check_approver(principal, ctx)?;
                if principal == first_approver {
                    return Err(WorkflowError::RepeatApprover {
                        principal: principal.clone(),
                    });
                }
                Ok(Transition::new(
                    EntryState::Posted {
                        approvers: vec![first_approver.clone(), principal.clone()],
                    },
                    vec![AuditAction::Approved, AuditAction::Posted],
                ))
            }

            (
                EntryState::PendingFirstApproval | EntryState::PendingFinalApproval { .. },
                WorkflowAction::Reject { principal, reason },
            ) => {
                if principal == ctx.created_by {
                    return Err(WorkflowError::SelfRejection {
                        principal: principal.clone(),
                    });
                }
                if !ctx.policy.is_authorized(principal) {
                    return Err(WorkflowError::Unauthorized {
                        principal: principal.clone(),
                    });
                }
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(WorkflowError::RejectionReasonRequired);
                }
                Ok(Transition::new(
                    EntryState::Rejected {
                        by: principal.clone(),
                        reason: reason.to_string(),
                    },
                    vec![AuditAction::Rejected],
                ))
            }

            (EntryState::Posted { .. }, WorkflowAction::Reverse { principal }) => {
                if !ctx.policy.is_authorized(principal) {
                    return Err(WorkflowError::Unauthorized {
                        principal: principal.clone(),
                    });
                }
                Ok(Transition::new(
                    EntryState::Reversed {
                        by: principal.clone(),
                    },
                    vec![AuditAction::Reversed],
                ))
            }

            _ => Err(WorkflowError::InvalidTransition {
                from: state.status(),
                action: action.name(),
            }),
        }
    }

    fn check_approver(principal: &Principal, ctx: TransitionContext<'_>) -> Result<(), WorkflowError> {
        if principal == ctx.created_by {
            return Err(WorkflowError::SelfApproval {
                principal: principal.clone(),
            });
        }
        if !ctx.policy.is_authorized(principal) {
            return Err(WorkflowError::Unauthorized {
                principal: principal.clone(),
            });
        }
        Ok(())
    }
}
