//! Candidate filtering, description similarity and match decisions.
//!
//! The engine is pure: the repository layer loads candidates, asks for a
//! decision, then re-validates the chosen entry inside its own transaction
//! before linking it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tally_shared::types::{BankTransactionId, within_tolerance};

use super::types::{Candidate, MatchDecision, MatchSettings, ReviewReason};

/// Decimal places kept on similarity and confidence scores.
const SCORE_SCALE: u32 = 4;

/// Lower-cased alphanumeric words of a description.
#[must_use]
pub fn word_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of the word sets of two descriptions, in `[0, 1]`.
///
/// Two descriptions without any words score zero.
#[must_use]
pub fn jaccard_similarity(a: &str, b: &str) -> Decimal {
    let left = word_set(a);
    let right = word_set(b);
    let union = left.union(&right).count();
    if union == 0 {
        return Decimal::ZERO;
    }
    let intersection = left.intersection(&right).count();
    (Decimal::from(intersection) / Decimal::from(union)).round_dp(SCORE_SCALE)
}

/// Auto-matching rules.
pub struct MatchingEngine;

impl MatchingEngine {
    /// Returns the candidates a transaction could be matched to.
    ///
    /// A candidate qualifies when it is dated within the window, its total is
    /// within tolerance of the absolute transaction amount, and it is not
    /// linked to another transaction.
    #[must_use]
    pub fn eligible<'a>(
        transaction_id: BankTransactionId,
        transaction_date: NaiveDate,
        amount: Decimal,
        candidates: &'a [Candidate],
        settings: &MatchSettings,
    ) -> Vec<&'a Candidate> {
        candidates
            .iter()
            .filter(|c| {
                (c.entry_date - transaction_date).num_days().abs() <= settings.date_window_days
            })
            .filter(|c| within_tolerance(c.total, amount.abs(), settings.amount_tolerance))
            .filter(|c| c.linked_transaction.is_none_or(|t| t == transaction_id))
            .collect()
    }

    /// Chooses between the eligible candidates for a transaction.
    #[must_use]
    pub fn decide(
        description: &str,
        eligible: &[&Candidate],
        settings: &MatchSettings,
    ) -> MatchDecision {
        match eligible {
            [] => MatchDecision::Review(ReviewReason::NoCandidates),
            [only] => Self::by_confidence(only, settings.single_candidate_confidence, settings),
            _ => {
                let mut scored: Vec<(Decimal, &Candidate)> = eligible
                    .iter()
                    .map(|c| (jaccard_similarity(description, &c.memo), *c))
                    .collect();
                scored.sort_by(|a, b| b.0.cmp(&a.0));

                let (best_score, best) = scored[0];
                let runner_up = scored[1].0;
                if best_score >= settings.similarity_threshold
                    && best_score - runner_up > settings.ambiguity_margin
                {
                    Self::by_confidence(best, Self::confidence_from_similarity(best_score), settings)
                } else {
                    MatchDecision::Review(ReviewReason::Ambiguous {
                        candidates: scored.iter().map(|(_, c)| c.entry_id).collect(),
                    })
                }
            }
        }
    }

    /// Confidence for a candidate picked by similarity: `0.2 + 0.8 * similarity`.
    #[must_use]
    pub fn confidence_from_similarity(similarity: Decimal) -> Decimal {
        (Decimal::new(2, 1) + Decimal::new(8, 1) * similarity).round_dp(SCORE_SCALE)
    }

    fn by_confidence(
        candidate: &Candidate,
        confidence: Decimal,
        settings: &MatchSettings,
    ) -> MatchDecision {
        if confidence >= settings.auto_match_floor {
            MatchDecision::Match {
                entry_id: candidate.entry_id,
                confidence,
            }
        } else {
            MatchDecision::Suggest {
                entry_id: candidate.entry_id,
                confidence,
            }
        }
    }
}
