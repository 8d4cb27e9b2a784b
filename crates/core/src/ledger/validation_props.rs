//! Property-based tests for entry validation.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tally_shared::types::{AccountId, CENT, EntityId};

use super::error::LedgerError;
use super::service::LedgerService;
use super::types::{AccountInfo, LineInput};

const ACCOUNTS: usize = 4;

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// Balanced `(account index, debit, credit)` triples: random debits, and the
/// same total split across one to three credits.
fn arb_balanced() -> impl Strategy<Value = Vec<(usize, Decimal, Decimal)>> {
    (
        prop::collection::vec((0..ACCOUNTS, arb_amount()), 1..6),
        prop::collection::vec(0..ACCOUNTS, 1..4),
    )
        .prop_map(|(debits, credit_accounts)| {
            let total: Decimal = debits.iter().map(|(_, a)| *a).sum();
            let mut lines: Vec<(usize, Decimal, Decimal)> = debits
                .into_iter()
                .map(|(idx, amount)| (idx, amount, Decimal::ZERO))
                .collect();

            let parts = Decimal::from(credit_accounts.len());
            let share = ((total / CENT) / parts).trunc() * CENT;
            let mut remaining = total;
            for (i, idx) in credit_accounts.iter().enumerate() {
                let amount = if i + 1 == credit_accounts.len() {
                    remaining
                } else {
                    share
                };
                if amount > Decimal::ZERO {
                    lines.push((*idx, Decimal::ZERO, amount));
                    remaining -= amount;
                }
            }
            lines
        })
}

fn fixture() -> (EntityId, Vec<AccountId>, HashMap<AccountId, AccountInfo>) {
    let entity = EntityId::new();
    let ids: Vec<AccountId> = (0..ACCOUNTS).map(|_| AccountId::new()).collect();
    let infos = ids
        .iter()
        .map(|&id| {
            (
                id,
                AccountInfo {
                    id,
                    entity_id: entity,
                    allow_posting: true,
                },
            )
        })
        .collect();
    (entity, ids, infos)
}

fn to_lines(ids: &[AccountId], triples: &[(usize, Decimal, Decimal)]) -> Vec<LineInput> {
    triples
        .iter()
        .map(|&(idx, debit, credit)| LineInput {
            account_id: ids[idx],
            debit,
            credit,
            description: None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Balanced line sets always validate with equal totals.
    #[test]
    fn prop_balanced_lines_validate(triples in arb_balanced()) {
        let (entity, ids, infos) = fixture();
        let lines = to_lines(&ids, &triples);

        let totals = LedgerService::validate_lines(entity, &lines, |id| infos.get(&id).copied());
        prop_assert!(totals.is_ok());
        let totals = totals.unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
    }

    /// Moving any single line by one cent makes the entry unbalanced.
    #[test]
    fn prop_one_cent_off_is_unbalanced(
        triples in arb_balanced(),
        index in any::<prop::sample::Index>(),
    ) {
        let (entity, ids, infos) = fixture();
        let mut lines = to_lines(&ids, &triples);

        let i = index.index(lines.len());
        if lines[i].debit > Decimal::ZERO {
            lines[i].debit += CENT;
        } else {
            lines[i].credit += CENT;
        }

        let result = LedgerService::validate_lines(entity, &lines, |id| infos.get(&id).copied());
        let is_unbalanced = matches!(result, Err(LedgerError::Unbalanced { .. }));
        prop_assert!(is_unbalanced);
    }
}
