//! Property-based tests for WorkflowService.

use proptest::prelude::*;
use tally_shared::types::Principal;

use crate::workflow::error::WorkflowError;
use crate::workflow::policy::{ApprovalMode, AuthorizationPolicy};
use crate::workflow::service::{TransitionContext, WorkflowService};
use crate::workflow::types::{EntryState, EntryStatus, WorkflowAction};

const POOL: [&str; 5] = [
    "alice@example.com",
    "bob@example.com",
    "carol@example.com",
    "dave@example.com",
    "erin@example.com",
];

fn principal(i: usize) -> Principal {
    Principal::new(POOL[i % POOL.len()]).unwrap()
}

/// Status edges the workflow may take.
fn reachable(from: EntryStatus, to: EntryStatus) -> bool {
    matches!(
        (from, to),
        (EntryStatus::Draft, EntryStatus::PendingFirstApproval)
            | (
                EntryStatus::PendingFirstApproval,
                EntryStatus::PendingFinalApproval | EntryStatus::Posted | EntryStatus::Rejected
            )
            | (
                EntryStatus::PendingFinalApproval,
                EntryStatus::Posted | EntryStatus::Rejected
            )
            | (EntryStatus::Posted, EntryStatus::Reversed)
    )
}

fn arb_principal() -> impl Strategy<Value = Principal> {
    (0..POOL.len()).prop_map(principal)
}

fn arb_mode() -> impl Strategy<Value = ApprovalMode> {
    prop_oneof![Just(ApprovalMode::Dual), Just(ApprovalMode::Single)]
}

/// Policies authorize a random subset of the pool.
fn arb_policy() -> impl Strategy<Value = AuthorizationPolicy> {
    (prop::collection::vec(arb_principal(), 0..5), arb_mode())
        .prop_map(|(approvers, mode)| AuthorizationPolicy::new(approvers, mode))
}

fn arb_action() -> impl Strategy<Value = WorkflowAction> {
    prop_oneof![
        arb_principal().prop_map(|principal| WorkflowAction::Submit { principal }),
        arb_principal().prop_map(|principal| WorkflowAction::Approve { principal }),
        (arb_principal(), "[a-z ]{0,12}")
            .prop_map(|(principal, reason)| WorkflowAction::Reject { principal, reason }),
        arb_principal().prop_map(|principal| WorkflowAction::Reverse { principal }),
    ]
}

fn arb_terminal_state() -> impl Strategy<Value = EntryState> {
    prop_oneof![
        (arb_principal(), "[a-z]{1,8}").prop_map(|(by, reason)| EntryState::Rejected { by, reason }),
        arb_principal().prop_map(|by| EntryState::Reversed { by }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Rejected and reversed entries accept no action at all.
    #[test]
    fn prop_terminal_states_reject_every_action(
        state in arb_terminal_state(),
        action in arb_action(),
        policy in arb_policy(),
        creator in arb_principal(),
    ) {
        let ctx = TransitionContext { created_by: &creator, policy: &policy };
        let result = WorkflowService::transition(&state, &action, ctx);
        let is_invalid_transition = matches!(result, Err(WorkflowError::InvalidTransition { .. }));
        prop_assert!(is_invalid_transition);
    }

    /// Any random action sequence that ends in Posted was approved by enough
    /// distinct, authorized principals, none of them the creator.
    #[test]
    fn prop_posting_requires_distinct_authorized_non_creator_approvals(
        actions in prop::collection::vec(arb_action(), 1..12),
        policy in arb_policy(),
        creator in arb_principal(),
    ) {
        let ctx = TransitionContext { created_by: &creator, policy: &policy };
        let mut state = EntryState::Draft;
        for action in &actions {
            if let Ok(t) = WorkflowService::transition(&state, action, ctx) {
                prop_assert!(reachable(state.status(), t.next.status()));
                state = t.next;
            }
        }

        let approvers = state.approvers();
        for approver in &approvers {
            prop_assert_ne!(*approver, &creator);
            prop_assert!(policy.is_authorized(approver));
        }
        if let EntryState::Posted { approvers } = &state {
            prop_assert!(approvers.len() >= policy.required_approvals());
            if approvers.len() == 2 {
                prop_assert_ne!(&approvers[0], &approvers[1]);
            }
        }
    }

    /// The creator can never move an entry forward by approving it.
    #[test]
    fn prop_creator_never_approves(
        policy in arb_policy(),
        creator in arb_principal(),
        first in arb_principal(),
    ) {
        let approve = WorkflowAction::Approve { principal: creator.clone() };
        let ctx = TransitionContext { created_by: &creator, policy: &policy };
        for state in [
            EntryState::PendingFirstApproval,
            EntryState::PendingFinalApproval { first_approver: first.clone() },
        ] {
            let result = WorkflowService::transition(&state, &approve, ctx);
            let is_self_approval = matches!(result, Err(WorkflowError::SelfApproval { .. }));
            prop_assert!(is_self_approval);
        }
    }

    /// Submit only ever leaves Draft.
    #[test]
    fn prop_submit_only_from_draft(principal in arb_principal(), policy in arb_policy()) {
        let submit = WorkflowAction::Submit { principal: principal.clone() };
        let ctx = TransitionContext { created_by: &principal, policy: &policy };
        let t = WorkflowService::transition(&EntryState::Draft, &submit, ctx).unwrap();
        prop_assert_eq!(t.next.status(), EntryStatus::PendingFirstApproval);
        prop_assert!(WorkflowService::transition(&t.next, &submit, ctx).is_err());
    }
}
