//! Integration tests for the bank feed, matching and reconciliation reports.

mod common;

use futures::future::{join, join_all};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{Fixture, date, p, setup};
use tally_core::ledger::{InvalidAccountReason, LineInput};
use tally_core::reconciliation::{
    BankAccount, BankTransactionInput, MatchDecision, MatchStatus, ReconciliationError,
    ReviewReason,
};
use tally_core::workflow::EntryStatus;
use tally_db::ReconciliationRepository;
use tally_shared::config::ReconciliationConfig;

fn repo(fx: &Fixture) -> ReconciliationRepository {
    ReconciliationRepository::new(fx.db.clone(), &ReconciliationConfig::default())
}

async fn bank_account(fx: &Fixture) -> BankAccount {
    repo(fx)
        .create_bank_account(fx.entity_id, "Operating Checking", fx.cash)
        .await
        .expect("create bank account")
}

fn feed(external_id: &str, day: u32, amount: Decimal, description: &str) -> BankTransactionInput {
    BankTransactionInput {
        external_id: external_id.to_string(),
        date: date(2024, 10, day),
        amount,
        description: description.to_string(),
    }
}

// ============================================================================
// Bank accounts and ingest
// ============================================================================

#[tokio::test]
async fn test_bank_account_needs_posting_account_of_entity() {
    let fx = setup().await;
    let result = repo(&fx)
        .create_bank_account(fx.entity_id, "Header", fx.assets_header)
        .await;
    assert!(matches!(
        result,
        Err(ReconciliationError::InvalidGlAccount {
            reason: InvalidAccountReason::NonPosting,
            ..
        })
    ));

    let account = bank_account(&fx).await;
    let listed = repo(&fx).list_bank_accounts(fx.entity_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, account.id);
    assert_eq!(listed[0].gl_account_id, fx.cash);
}

#[tokio::test]
async fn test_ingest_is_idempotent_by_external_id() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let batch = vec![
        feed("tx-1", 16, dec!(-250.00), "STAPLES #1123"),
        feed("tx-2", 17, dec!(1000.00), "Customer deposit"),
    ];

    let first = repo(&fx).ingest(account.id, batch.clone()).await.unwrap();
    assert_eq!((first.inserted, first.duplicates), (2, 0));

    let mut again = batch;
    again.push(feed("tx-3", 18, dec!(-12.50), "Bank fee"));
    let second = repo(&fx).ingest(account.id, again).await.unwrap();
    assert_eq!((second.inserted, second.duplicates), (1, 2));

    let all = repo(&fx).list_transactions(account.id, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|t| t.match_status == MatchStatus::Unmatched));
}

// ============================================================================
// Auto-matching
// ============================================================================

#[tokio::test]
async fn test_single_candidate_is_matched_automatically() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let entry = fx
        .post_simple(date(2024, 10, 15), "Office supplies", fx.expenses, fx.cash, dec!(250.00))
        .await;
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 16, dec!(-250.00), "STAPLES office supplies")])
        .await
        .unwrap();

    let summary = repo(&fx).auto_match(account.id).await.unwrap();
    assert_eq!(summary.matched.len(), 1);
    assert!(summary.review.is_empty());
    assert_eq!(
        summary.matched[0].decision,
        MatchDecision::Match {
            entry_id: entry.id,
            confidence: dec!(0.95),
        }
    );

    let linked = repo(&fx)
        .matched_transaction_for_entry(entry.id)
        .await
        .unwrap()
        .expect("entry is linked");
    assert_eq!(linked.match_status, MatchStatus::Matched);
    assert_eq!(linked.match_confidence, Some(dec!(0.95)));
    assert!(linked.matched_by.is_none());

    let rerun = repo(&fx).auto_match(account.id).await.unwrap();
    assert!(rerun.matched.is_empty() && rerun.review.is_empty());
}

#[tokio::test]
async fn test_indistinguishable_candidates_go_to_review() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let first = fx
        .post_simple(date(2024, 10, 14), "Consulting fee", fx.expenses, fx.cash, dec!(100))
        .await;
    let second = fx
        .post_simple(date(2024, 10, 15), "Consulting fee", fx.expenses, fx.cash, dec!(100))
        .await;
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 15, dec!(-100), "Consulting fee")])
        .await
        .unwrap();

    let summary = repo(&fx).auto_match(account.id).await.unwrap();
    assert!(summary.matched.is_empty());
    match &summary.review[0].decision {
        MatchDecision::Review(ReviewReason::Ambiguous { candidates }) => {
            assert_eq!(candidates.len(), 2);
            assert!(candidates.contains(&first.id) && candidates.contains(&second.id));
        }
        other => panic!("Expected ambiguous review, got {other:?}"),
    }
    let txs = repo(&fx)
        .list_transactions(account.id, Some(MatchStatus::Unmatched))
        .await
        .unwrap();
    assert_eq!(txs.len(), 1, "nothing is guessed");
}

#[tokio::test]
async fn test_weak_similarity_is_only_suggested() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let rent = fx
        .post_simple(date(2024, 10, 1), "Monthly rent payment", fx.expenses, fx.cash, dec!(1500))
        .await;
    fx.post_simple(date(2024, 10, 2), "Insurance premium", fx.expenses, fx.cash, dec!(1500))
        .await;
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 2, dec!(-1500), "rent payment October")])
        .await
        .unwrap();

    let summary = repo(&fx).auto_match(account.id).await.unwrap();
    assert_eq!(
        summary.suggested[0].decision,
        MatchDecision::Suggest {
            entry_id: rent.id,
            confidence: dec!(0.6),
        }
    );
    assert!(repo(&fx).matched_transaction_for_entry(rent.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_no_candidates_when_amounts_differ() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    fx.post_simple(date(2024, 10, 15), "Office supplies", fx.expenses, fx.cash, dec!(250.00))
        .await;
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 16, dec!(-250.02), "Office supplies")])
        .await
        .unwrap();

    let summary = repo(&fx).auto_match(account.id).await.unwrap();
    assert_eq!(
        summary.review[0].decision,
        MatchDecision::Review(ReviewReason::NoCandidates)
    );
}

// ============================================================================
// Manual matching
// ============================================================================

#[tokio::test]
async fn test_manual_match_checks_amount() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let entry = fx
        .post_simple(date(2024, 10, 15), "Office supplies", fx.expenses, fx.cash, dec!(250.00))
        .await;
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 16, dec!(-249.00), "STAPLES")])
        .await
        .unwrap();
    let tx = repo(&fx).list_transactions(account.id, None).await.unwrap()[0].clone();

    let result = repo(&fx)
        .match_transaction(tx.id, entry.id, &p("bob@example.com"))
        .await;
    match result {
        Err(ReconciliationError::AmountMismatch {
            transaction_amount,
            entry_total,
            ..
        }) => {
            assert_eq!(transaction_amount, dec!(249.00));
            assert_eq!(entry_total, dec!(250.00));
        }
        other => panic!("Expected AmountMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_entry_links_to_at_most_one_transaction() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let entry = fx
        .post_simple(date(2024, 10, 15), "Supplies", fx.expenses, fx.cash, dec!(80))
        .await;
    repo(&fx)
        .ingest(
            account.id,
            vec![
                feed("tx-1", 15, dec!(-80), "Supplies"),
                feed("tx-2", 16, dec!(-80), "Supplies again"),
            ],
        )
        .await
        .unwrap();
    let txs = repo(&fx).list_transactions(account.id, None).await.unwrap();
    let bob = p("bob@example.com");

    let matched = repo(&fx).match_transaction(txs[0].id, entry.id, &bob).await.unwrap();
    assert_eq!(matched.match_confidence, Some(Decimal::ONE));
    assert_eq!(matched.matched_by, Some(bob.clone()));

    let second = repo(&fx).match_transaction(txs[1].id, entry.id, &bob).await;
    assert!(matches!(
        second,
        Err(ReconciliationError::EntryAlreadyMatched { transaction_id, .. }) if transaction_id == txs[0].id
    ));

    let again = repo(&fx).match_transaction(txs[0].id, entry.id, &bob).await;
    assert!(matches!(again, Err(ReconciliationError::AlreadyMatched { .. })));
}

#[tokio::test]
async fn test_concurrent_manual_matches_link_entry_once() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let entry = fx
        .post_simple(date(2024, 10, 15), "Supplies", fx.expenses, fx.cash, dec!(80))
        .await;
    repo(&fx)
        .ingest(
            account.id,
            vec![
                feed("tx-1", 15, dec!(-80), "Supplies"),
                feed("tx-2", 16, dec!(-80), "Supplies again"),
            ],
        )
        .await
        .unwrap();
    let txs = repo(&fx).list_transactions(account.id, None).await.unwrap();
    let (bob, carol) = (p("bob@example.com"), p("carol@example.com"));
    let (first, second) = (repo(&fx), repo(&fx));

    let results = join_all([
        first.match_transaction(txs[0].id, entry.id, &bob),
        second.match_transaction(txs[1].id, entry.id, &carol),
    ])
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        match result {
            Err(ReconciliationError::EntryAlreadyMatched { .. })
            | Err(ReconciliationError::ConcurrentModification(_)) => {}
            other => panic!("unexpected loser result {other:?}"),
        }
    }
    let matched = repo(&fx)
        .list_transactions(account.id, Some(MatchStatus::Matched))
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].matched_entry_id, Some(entry.id));
}

#[tokio::test]
async fn test_auto_match_racing_manual_match_links_once() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let entry = fx
        .post_simple(date(2024, 10, 15), "Office supplies", fx.expenses, fx.cash, dec!(250))
        .await;
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 16, dec!(-250), "STAPLES office supplies")])
        .await
        .unwrap();
    let tx = repo(&fx).list_transactions(account.id, None).await.unwrap()[0].clone();
    let (auto, manual) = (repo(&fx), repo(&fx));
    let bob = p("bob@example.com");

    let (summary, manual_result) = join(
        auto.auto_match(account.id),
        manual.match_transaction(tx.id, entry.id, &bob),
    )
    .await;
    let summary = summary.unwrap();

    let manual_won = match manual_result {
        Ok(_) => true,
        Err(
            ReconciliationError::AlreadyMatched { .. }
            | ReconciliationError::EntryAlreadyMatched { .. }
            | ReconciliationError::ConcurrentModification(_),
        ) => false,
        Err(other) => panic!("unexpected manual result {other:?}"),
    };
    assert_eq!(summary.matched.len() + usize::from(manual_won), 1);

    let linked = repo(&fx).get_transaction(tx.id).await.unwrap();
    assert_eq!(linked.match_status, MatchStatus::Matched);
    assert_eq!(linked.matched_entry_id, Some(entry.id));
}

#[tokio::test]
async fn test_only_posted_entries_can_be_matched() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let draft = fx
        .ledger()
        .create_entry(fx.entry(
            date(2024, 10, 15),
            "draft",
            vec![
                LineInput::debit(fx.expenses, dec!(5)),
                LineInput::credit(fx.cash, dec!(5)),
            ],
        ))
        .await
        .unwrap();
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 15, dec!(-5), "draft")])
        .await
        .unwrap();
    let tx = repo(&fx).list_transactions(account.id, None).await.unwrap()[0].clone();

    let result = repo(&fx)
        .match_transaction(tx.id, draft.id, &p("bob@example.com"))
        .await;
    assert!(matches!(result, Err(ReconciliationError::EntryNotPosted { .. })));
}

#[tokio::test]
async fn test_unmatch_clears_link_and_is_idempotent() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let entry = fx
        .post_simple(date(2024, 10, 15), "Supplies", fx.expenses, fx.cash, dec!(80))
        .await;
    repo(&fx)
        .ingest(account.id, vec![feed("tx-1", 15, dec!(-80), "Supplies")])
        .await
        .unwrap();
    let tx = repo(&fx).list_transactions(account.id, None).await.unwrap()[0].clone();
    let bob = p("bob@example.com");
    repo(&fx).match_transaction(tx.id, entry.id, &bob).await.unwrap();

    let cleared = repo(&fx).unmatch(tx.id, &bob).await.unwrap();
    assert_eq!(cleared.match_status, MatchStatus::Unmatched);
    assert!(cleared.matched_entry_id.is_none());
    assert!(cleared.match_confidence.is_none());

    let again = repo(&fx).unmatch(tx.id, &bob).await.unwrap();
    assert_eq!(again.version, cleared.version);

    let entry = fx.ledger().get_entry(entry.id).await.unwrap();
    assert_eq!(entry.status(), EntryStatus::Posted);
}

// ============================================================================
// Reconciliation reports
// ============================================================================

#[tokio::test]
async fn test_report_accounts_for_outstanding_checks() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    let deposit = fx
        .post_simple(date(2024, 10, 1), "Opening deposit", fx.cash, fx.revenue, dec!(1000))
        .await;
    let supplies = fx
        .post_simple(date(2024, 10, 15), "Office supplies", fx.expenses, fx.cash, dec!(250))
        .await;
    let check = fx
        .post_simple(date(2024, 10, 30), "Check 1042 to landlord", fx.expenses, fx.cash, dec!(100))
        .await;

    repo(&fx)
        .ingest(
            account.id,
            vec![
                feed("tx-1", 1, dec!(1000), "Opening deposit"),
                feed("tx-2", 16, dec!(-250), "STAPLES office supplies"),
            ],
        )
        .await
        .unwrap();
    let summary = repo(&fx).auto_match(account.id).await.unwrap();
    assert_eq!(summary.matched.len(), 2);

    let controller = p("controller@example.com");
    let report = repo(&fx)
        .generate_report(account.id, date(2024, 10, 1), date(2024, 10, 31), dec!(750), &controller)
        .await
        .unwrap();

    assert_eq!(report.gl_balance, dec!(650));
    assert!(report.outstanding_deposits.is_empty());
    assert_eq!(report.outstanding_checks.len(), 1);
    assert_eq!(report.outstanding_checks[0].entry_id, check.id);
    assert_eq!(report.outstanding_checks[0].amount, dec!(100));
    assert_eq!(report.figures.adjusted_bank_balance, dec!(650));
    assert_eq!(report.figures.difference, dec!(0));
    assert!(report.figures.is_reconciled);

    for entry_id in [deposit.id, supplies.id] {
        let tx = repo(&fx)
            .matched_transaction_for_entry(entry_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.match_status, MatchStatus::Cleared);
    }

    let stored = repo(&fx).get_report(report.id).await.unwrap();
    assert_eq!(stored.outstanding_checks, report.outstanding_checks);
    assert_eq!(stored.prepared_by, controller);
}

#[tokio::test]
async fn test_unreconciled_report_is_kept_as_issued() {
    let fx = setup().await;
    let account = bank_account(&fx).await;
    fx.post_simple(date(2024, 10, 1), "Opening deposit", fx.cash, fx.revenue, dec!(1000))
        .await;
    let controller = p("controller@example.com");

    let first = repo(&fx)
        .generate_report(account.id, date(2024, 10, 1), date(2024, 10, 31), dec!(900), &controller)
        .await
        .unwrap();
    assert!(!first.figures.is_reconciled);
    assert_eq!(first.figures.adjusted_bank_balance, dec!(1900));
    assert_eq!(first.figures.difference, dec!(-900));

    fx.post_simple(date(2024, 10, 20), "Late entry", fx.expenses, fx.cash, dec!(50))
        .await;
    let reports = repo(&fx).list_reports(account.id).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].gl_balance, dec!(1000), "snapshots are not recomputed");

    let inverted = repo(&fx)
        .generate_report(account.id, date(2024, 11, 1), date(2024, 10, 31), dec!(0), &controller)
        .await;
    assert!(matches!(inverted, Err(ReconciliationError::InvalidPeriod { .. })));
}
