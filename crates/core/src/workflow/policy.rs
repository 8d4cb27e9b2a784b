//! Authorization policy for entry approvals.
//!
//! The approver allow-list is owned by the identity collaborator and handed
//! in per call. The core only checks membership.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tally_shared::types::Principal;

pub use tally_shared::config::ApprovalMode;

/// Who may approve, reject or reverse entries, and how many approvals post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicy {
    approvers: HashSet<Principal>,
    mode: ApprovalMode,
}

impl AuthorizationPolicy {
    /// Creates a policy from an approver set and an explicit mode.
    pub fn new(approvers: impl IntoIterator<Item = Principal>, mode: ApprovalMode) -> Self {
        Self {
            approvers: approvers.into_iter().collect(),
            mode,
        }
    }

    /// Two distinct non-creator approvals post an entry.
    pub fn dual(approvers: impl IntoIterator<Item = Principal>) -> Self {
        Self::new(approvers, ApprovalMode::Dual)
    }

    /// One non-creator approval posts an entry.
    pub fn single(approvers: impl IntoIterator<Item = Principal>) -> Self {
        Self::new(approvers, ApprovalMode::Single)
    }

    /// Returns true if `principal` is in the authorized approver set.
    #[must_use]
    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.approvers.contains(principal)
    }

    /// The configured approval mode.
    #[must_use]
    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// Number of distinct approvals needed to post.
    #[must_use]
    pub fn required_approvals(&self) -> usize {
        match self.mode {
            ApprovalMode::Dual => 2,
            ApprovalMode::Single => 1,
        }
    }
}
