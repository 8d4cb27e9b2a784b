//! Integration tests for the ledger repository: entry validation, the
//! approval workflow, posting and reversal.

mod common;

use futures::future::join_all;
use rust_decimal_macros::dec;

use common::{date, p, setup};
use tally_core::audit::AuditAction;
use tally_core::ledger::{
    DocumentProposal, EntryFilter, InvalidAccountReason, LedgerError, LineInput, SourceType,
};
use tally_core::workflow::{EntryState, EntryStatus, WorkflowError};
use tally_shared::types::JournalEntryId;

// ============================================================================
// Entry validation
// ============================================================================

#[tokio::test]
async fn test_unbalanced_entry_is_rejected() {
    let fx = setup().await;
    let result = fx
        .ledger()
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "Office supplies",
            vec![
                LineInput::debit(fx.expenses, dec!(500.00)),
                LineInput::credit(fx.cash, dec!(499.99)),
            ],
        ))
        .await;

    match result {
        Err(LedgerError::Unbalanced { debit, credit, .. }) => {
            assert_eq!(debit, dec!(500.00));
            assert_eq!(credit, dec!(499.99));
        }
        other => panic!("Expected Unbalanced, got {other:?}"),
    }
    let entries = fx
        .ledger()
        .list_entries(fx.entity_id, &EntryFilter::default())
        .await
        .unwrap();
    assert!(entries.is_empty(), "nothing may be persisted");
}

#[tokio::test]
async fn test_header_account_cannot_be_posted_to() {
    let fx = setup().await;
    let result = fx
        .ledger()
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "Wrong account",
            vec![
                LineInput::debit(fx.assets_header, dec!(10)),
                LineInput::credit(fx.cash, dec!(10)),
            ],
        ))
        .await;

    assert!(matches!(
        result,
        Err(LedgerError::InvalidAccount {
            reason: InvalidAccountReason::NonPosting,
            ..
        })
    ));
}

#[tokio::test]
async fn test_entry_outside_any_period_is_rejected() {
    let fx = setup().await;
    let result = fx
        .ledger()
        .create_entry(fx.entry(
            date(2023, 12, 31),
            "Before the books",
            vec![
                LineInput::debit(fx.expenses, dec!(10)),
                LineInput::credit(fx.cash, dec!(10)),
            ],
        ))
        .await;

    assert!(matches!(result, Err(LedgerError::NoPeriod { .. })));
}

#[tokio::test]
async fn test_entries_are_numbered_per_entity() {
    let fx = setup().await;
    let ledger = fx.ledger();
    let lines = || {
        vec![
            LineInput::debit(fx.expenses, dec!(5)),
            LineInput::credit(fx.cash, dec!(5)),
        ]
    };

    let first = ledger
        .create_entry(fx.entry(date(2024, 3, 1), "first", lines()))
        .await
        .unwrap();
    let second = ledger
        .create_entry(fx.entry(date(2024, 3, 2), "second", lines()))
        .await
        .unwrap();

    assert_eq!(first.entry_number, 1);
    assert_eq!(second.entry_number, 2);
    assert_eq!(second.display_number(), "JE-2");
    assert_eq!(first.period_id, fx.month(3).id);
    assert_eq!(first.fiscal_year, 2024);
}

// ============================================================================
// Drafts
// ============================================================================

#[tokio::test]
async fn test_empty_draft_cannot_be_submitted() {
    let fx = setup().await;
    let ledger = fx.ledger();
    let draft = ledger
        .create_entry(fx.entry(date(2024, 10, 1), "placeholder", vec![]))
        .await
        .expect("empty drafts may be saved");

    let result = ledger.submit(draft.id, p("alice@example.com")).await;
    assert!(matches!(result, Err(LedgerError::EmptyEntry { entry_id }) if entry_id == draft.id));

    let edited = ledger
        .replace_draft_lines(
            draft.id,
            vec![
                LineInput::debit(fx.expenses, dec!(42)),
                LineInput::credit(fx.payables, dec!(42)),
            ],
        )
        .await
        .unwrap();
    assert_eq!(edited.lines.len(), 2);
    assert_eq!(edited.version, draft.version + 1);

    let submitted = ledger.submit(draft.id, p("alice@example.com")).await.unwrap();
    assert_eq!(submitted.status(), EntryStatus::PendingFirstApproval);
}

#[tokio::test]
async fn test_only_drafts_can_be_deleted() {
    let fx = setup().await;
    let ledger = fx.ledger();
    let draft = ledger
        .create_entry(fx.entry(
            date(2024, 10, 1),
            "scratch",
            vec![
                LineInput::debit(fx.expenses, dec!(1)),
                LineInput::credit(fx.cash, dec!(1)),
            ],
        ))
        .await
        .unwrap();
    ledger.delete_draft(draft.id).await.unwrap();
    assert!(matches!(
        ledger.get_entry(draft.id).await,
        Err(LedgerError::EntryNotFound(_))
    ));

    let posted = fx
        .post_simple(date(2024, 10, 2), "kept", fx.expenses, fx.cash, dec!(3))
        .await;
    assert!(matches!(
        ledger.delete_draft(posted.id).await,
        Err(LedgerError::CanOnlyDeleteDraft {
            status: EntryStatus::Posted,
            ..
        })
    ));
}

#[tokio::test]
async fn test_document_proposal_becomes_draft() {
    let fx = setup().await;
    let proposal = DocumentProposal {
        document_id: "inv-2024-118".to_string(),
        amount: dec!(89.90),
        description: " Printer toner ".to_string(),
        date: date(2024, 5, 20),
        suggested_account: fx.expenses,
    };

    let entry = fx
        .ledger()
        .create_from_document(fx.entity_id, &proposal, fx.payables, p("alice@example.com"))
        .await
        .unwrap();

    assert_eq!(entry.source_type, SourceType::Document);
    assert_eq!(entry.source_id.as_deref(), Some("inv-2024-118"));
    assert_eq!(entry.memo, "Printer toner");
    assert_eq!(entry.lines[0].debit, dec!(89.90));
    assert_eq!(entry.lines[1].account_id, fx.payables);
    assert_eq!(entry.status(), EntryStatus::Draft);
}

// ============================================================================
// Approval workflow
// ============================================================================

#[tokio::test]
async fn test_creator_cannot_approve_own_entry() {
    let fx = setup().await;
    let ledger = fx.ledger();
    let entry = ledger
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "Supplies",
            vec![
                LineInput::debit(fx.expenses, dec!(20)),
                LineInput::credit(fx.cash, dec!(20)),
            ],
        ))
        .await
        .unwrap();
    ledger.submit(entry.id, p("alice@example.com")).await.unwrap();

    let result = ledger.approve(entry.id, p("Alice@Example.com")).await;
    assert!(matches!(
        result,
        Err(LedgerError::Workflow {
            source: WorkflowError::SelfApproval { .. },
            ..
        })
    ));
    let unchanged = ledger.get_entry(entry.id).await.unwrap();
    assert_eq!(unchanged.status(), EntryStatus::PendingFirstApproval);
}

#[tokio::test]
async fn test_dual_approval_posts_and_updates_balances() {
    let fx = setup().await;
    let ledger = fx.ledger();
    let entry = ledger
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "Office supplies",
            vec![
                LineInput::debit(fx.expenses, dec!(250.00)),
                LineInput::credit(fx.cash, dec!(250.00)),
            ],
        ))
        .await
        .unwrap();
    ledger.submit(entry.id, p("alice@example.com")).await.unwrap();

    let pending = ledger.approve(entry.id, p("bob@example.com")).await.unwrap();
    assert_eq!(pending.status(), EntryStatus::PendingFinalApproval);
    assert_eq!(fx.balance(fx.expenses).await, dec!(0));

    let repeat = ledger.approve(entry.id, p("bob@example.com")).await;
    assert!(matches!(
        repeat,
        Err(LedgerError::Workflow {
            source: WorkflowError::RepeatApprover { .. },
            ..
        })
    ));

    let outsider = ledger.approve(entry.id, p("mallory@example.com")).await;
    assert!(matches!(
        outsider,
        Err(LedgerError::Workflow {
            source: WorkflowError::Unauthorized { .. },
            ..
        })
    ));

    let posted = ledger.approve(entry.id, p("carol@example.com")).await.unwrap();
    assert_eq!(
        posted.state,
        EntryState::Posted {
            approvers: vec![p("bob@example.com"), p("carol@example.com")],
        }
    );
    assert!(posted.posted_at.is_some());
    assert_eq!(fx.balance(fx.expenses).await, dec!(250.00));
    assert_eq!(fx.balance(fx.cash).await, dec!(-250.00));

    let trail: Vec<AuditAction> = ledger
        .audit_trail(entry.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.action)
        .collect();
    assert_eq!(
        trail,
        vec![
            AuditAction::Created,
            AuditAction::Submitted,
            AuditAction::Approved,
            AuditAction::Approved,
            AuditAction::Posted,
        ]
    );
}

#[tokio::test]
async fn test_concurrent_final_approvals_post_once() {
    let fx = setup().await;
    let ledger = fx.ledger();
    let entry = ledger
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "Raced entry",
            vec![
                LineInput::debit(fx.expenses, dec!(75)),
                LineInput::credit(fx.cash, dec!(75)),
            ],
        ))
        .await
        .unwrap();
    ledger.submit(entry.id, p("alice@example.com")).await.unwrap();
    ledger.approve(entry.id, p("bob@example.com")).await.unwrap();

    let results = join_all([
        ledger.approve(entry.id, p("carol@example.com")),
        ledger.approve(entry.id, p("dave@example.com")),
    ])
    .await;

    let posted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(posted, 1, "exactly one approval may post the entry");
    for result in results.iter().filter(|r| r.is_err()) {
        match result {
            Err(LedgerError::Workflow {
                source: WorkflowError::InvalidTransition { .. },
                ..
            })
            | Err(LedgerError::ConcurrentModification { .. }) => {}
            other => panic!("unexpected loser result {other:?}"),
        }
    }
    assert_eq!(fx.balance(fx.expenses).await, dec!(75), "posted exactly once");
}

#[tokio::test]
async fn test_reject_requires_reason_and_is_terminal() {
    let fx = setup().await;
    let ledger = fx.ledger();
    let entry = ledger
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "Dubious",
            vec![
                LineInput::debit(fx.expenses, dec!(900)),
                LineInput::credit(fx.cash, dec!(900)),
            ],
        ))
        .await
        .unwrap();
    ledger.submit(entry.id, p("alice@example.com")).await.unwrap();

    let blank = ledger.reject(entry.id, p("bob@example.com"), "  ").await;
    assert!(matches!(
        blank,
        Err(LedgerError::Workflow {
            source: WorkflowError::RejectionReasonRequired,
            ..
        })
    ));

    let rejected = ledger
        .reject(entry.id, p("bob@example.com"), "No receipt attached")
        .await
        .unwrap();
    assert_eq!(rejected.status(), EntryStatus::Rejected);

    let again = ledger.approve(entry.id, p("carol@example.com")).await;
    assert!(matches!(
        again,
        Err(LedgerError::Workflow {
            source: WorkflowError::InvalidTransition { .. },
            ..
        })
    ));

    let trail = ledger.audit_trail(entry.id).await.unwrap();
    let last = trail.last().unwrap();
    assert_eq!(last.action, AuditAction::Rejected);
    assert_eq!(last.comment.as_deref(), Some("No receipt attached"));
    assert_eq!(fx.balance(fx.expenses).await, dec!(0));
}

// ============================================================================
// Reversal
// ============================================================================

#[tokio::test]
async fn test_reversal_nets_every_account_to_zero() {
    let fx = setup().await;
    let original = fx
        .post(fx.entry(
            date(2024, 10, 15),
            "Monthly rent",
            vec![
                LineInput::debit(fx.expenses, dec!(1200)),
                LineInput::credit(fx.cash, dec!(1000)),
                LineInput::credit(fx.payables, dec!(200)),
            ],
        ))
        .await;

    let expenses = fx.accounts().account_balance(fx.expenses).await.unwrap();
    assert_eq!(
        (expenses.debit_total, expenses.credit_total, expenses.balance),
        (dec!(1200), dec!(0), dec!(1200))
    );
    let payables = fx.accounts().account_balance(fx.payables).await.unwrap();
    assert_eq!(
        (payables.debit_total, payables.credit_total, payables.balance),
        (dec!(0), dec!(200), dec!(200))
    );

    let outcome = fx
        .ledger()
        .reverse_on(original.id, p("bob@example.com"), date(2024, 11, 2))
        .await
        .unwrap();

    assert_eq!(outcome.original.status(), EntryStatus::Reversed);
    let reversal = outcome.reversal;
    assert_eq!(reversal.status(), EntryStatus::Posted);
    assert_eq!(reversal.source_type, SourceType::Reversal);
    assert_eq!(reversal.reverses_entry_id, Some(original.id));
    assert_eq!(reversal.entry_date, date(2024, 10, 15));
    assert!(reversal.memo.starts_with("Reversal of JE-1"));

    for (orig, rev) in original.lines.iter().zip(&reversal.lines) {
        assert_eq!(orig.account_id, rev.account_id);
        assert_eq!(orig.debit, rev.credit);
        assert_eq!(orig.credit, rev.debit);
    }
    for account in [fx.expenses, fx.cash, fx.payables] {
        assert_eq!(fx.balance(account).await, dec!(0));
    }
    let expenses = fx.accounts().account_balance(fx.expenses).await.unwrap();
    assert_eq!(
        (expenses.debit_total, expenses.credit_total, expenses.balance),
        (dec!(1200), dec!(1200), dec!(0))
    );

    let found = fx.ledger().reversal_of(original.id).await.unwrap().unwrap();
    assert_eq!(found.id, reversal.id);

    let twice = fx
        .ledger()
        .reverse(original.id, p("bob@example.com"))
        .await;
    assert!(matches!(
        twice,
        Err(LedgerError::Workflow {
            source: WorkflowError::InvalidTransition { .. },
            ..
        })
    ));
}

#[tokio::test]
async fn test_only_posted_entries_can_be_reversed() {
    let fx = setup().await;
    let draft = fx
        .ledger()
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "draft",
            vec![
                LineInput::debit(fx.expenses, dec!(1)),
                LineInput::credit(fx.cash, dec!(1)),
            ],
        ))
        .await
        .unwrap();

    let result = fx.ledger().reverse(draft.id, p("bob@example.com")).await;
    assert!(matches!(result, Err(LedgerError::Workflow { .. })));
    assert!(matches!(
        fx.ledger().get_entry(JournalEntryId::new()).await,
        Err(LedgerError::EntryNotFound(_))
    ));
}

#[tokio::test]
async fn test_list_entries_filters_by_status_and_date() {
    let fx = setup().await;
    fx.post_simple(date(2024, 9, 30), "September", fx.expenses, fx.cash, dec!(10))
        .await;
    fx.post_simple(date(2024, 10, 1), "October", fx.expenses, fx.cash, dec!(20))
        .await;
    fx.ledger()
        .create_entry(fx.entry(date(2024, 10, 2), "draft", vec![]))
        .await
        .unwrap();

    let october_posted = fx
        .ledger()
        .list_entries(
            fx.entity_id,
            &EntryFilter {
                status: Some(EntryStatus::Posted),
                date_from: Some(date(2024, 10, 1)),
                date_to: Some(date(2024, 10, 31)),
                source_type: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(october_posted.len(), 1);
    assert_eq!(october_posted[0].memo, "October");
    assert_eq!(october_posted[0].lines.len(), 2);
}
