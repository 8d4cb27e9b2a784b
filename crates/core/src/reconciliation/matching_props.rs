//! Property-based tests for the matching engine.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{BankTransactionId, JournalEntryId};

use super::matching::{MatchingEngine, jaccard_similarity};
use super::types::{Candidate, MatchDecision, MatchSettings, ReviewReason};

const WORDS: [&str; 8] = ["acme", "rent", "payroll", "invoice", "october", "fee", "wire", "corp"];

fn arb_description() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(&WORDS[..]), 0..5).prop_map(|w| w.join(" "))
}

fn arb_candidate() -> impl Strategy<Value = Candidate> {
    (arb_description(), 0i64..10, 1i64..100_000).prop_map(|(memo, offset, cents)| Candidate {
        entry_id: JournalEntryId::new(),
        entry_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap() + chrono::Days::new(offset as u64),
        memo,
        total: Decimal::new(cents, 2),
        linked_transaction: None,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Similarity is symmetric and bounded by zero and one.
    #[test]
    fn prop_similarity_is_symmetric_and_bounded(a in arb_description(), b in arb_description()) {
        let ab = jaccard_similarity(&a, &b);
        prop_assert_eq!(ab, jaccard_similarity(&b, &a));
        prop_assert!(ab >= Decimal::ZERO && ab <= Decimal::ONE);
    }

    /// Eligible candidates always satisfy the window and amount rules.
    #[test]
    fn prop_eligible_respects_window_and_amount(
        candidates in prop::collection::vec(arb_candidate(), 0..8),
        offset in 0i64..10,
        cents in 1i64..100_000,
        outflow in any::<bool>(),
    ) {
        let settings = MatchSettings::default();
        let date = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap() + chrono::Days::new(offset as u64);
        let amount = if outflow { Decimal::new(-cents, 2) } else { Decimal::new(cents, 2) };
        let eligible =
            MatchingEngine::eligible(BankTransactionId::new(), date, amount, &candidates, &settings);
        for c in eligible {
            prop_assert!((c.entry_date - date).num_days().abs() <= settings.date_window_days);
            prop_assert!((c.total - amount.abs()).abs() < settings.amount_tolerance);
        }
    }

    /// A decision only ever names an eligible candidate, and automatic
    /// matches never fall below the floor.
    #[test]
    fn prop_decision_picks_from_eligible(
        description in arb_description(),
        candidates in prop::collection::vec(arb_candidate(), 0..6),
    ) {
        let settings = MatchSettings::default();
        let refs: Vec<&Candidate> = candidates.iter().collect();
        match MatchingEngine::decide(&description, &refs, &settings) {
            MatchDecision::Match { entry_id, confidence } => {
                prop_assert!(candidates.iter().any(|c| c.entry_id == entry_id));
                prop_assert!(confidence >= settings.auto_match_floor);
            }
            MatchDecision::Suggest { entry_id, confidence } => {
                prop_assert!(candidates.iter().any(|c| c.entry_id == entry_id));
                prop_assert!(confidence < settings.auto_match_floor);
            }
            MatchDecision::Review(ReviewReason::NoCandidates) => prop_assert!(candidates.is_empty()),
            MatchDecision::Review(ReviewReason::Ambiguous { candidates: ids }) => {
                prop_assert!(candidates.len() >= 2);
                prop_assert_eq!(ids.len(), candidates.len());
            }
            MatchDecision::Review(ReviewReason::PreconditionFailed { .. }) => {
                prop_assert!(false, "engine never reports a precondition failure");
            }
        }
    }

    /// Identical memos on two candidates are never resolved automatically.
    #[test]
    fn prop_duplicate_memos_are_ambiguous(description in arb_description(), memo in arb_description()) {
        let a = Candidate {
            entry_id: JournalEntryId::new(),
            entry_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            memo: memo.clone(),
            total: Decimal::ONE_HUNDRED,
            linked_transaction: None,
        };
        let b = Candidate { entry_id: JournalEntryId::new(), ..a.clone() };
        let decision = MatchingEngine::decide(&description, &[&a, &b], &MatchSettings::default());
        let is_ambiguous = matches!(decision, MatchDecision::Review(ReviewReason::Ambiguous { .. }));
        prop_assert!(is_ambiguous);
    }
}
