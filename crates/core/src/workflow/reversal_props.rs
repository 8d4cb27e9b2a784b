//! Property-based tests for ReversalService.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tally_shared::types::AccountId;

use crate::accounts::{AccountBalance, NormalBalance};
use crate::ledger::types::LineInput;
use crate::workflow::reversal::ReversalService;

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Balanced entries of two to five lines over three accounts.
fn arb_balanced_lines() -> impl Strategy<Value = Vec<LineInput>> {
    let accounts = [AccountId::new(), AccountId::new(), AccountId::new()];
    prop::collection::vec((0usize..3, arb_amount()), 1..4).prop_map(move |debits| {
        let total: Decimal = debits.iter().map(|(_, a)| *a).sum();
        let mut lines: Vec<LineInput> = debits
            .into_iter()
            .map(|(i, amount)| LineInput::debit(accounts[i], amount))
            .collect();
        lines.push(LineInput::credit(accounts[2], total));
        lines
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Reversing twice yields the original amounts.
    #[test]
    fn prop_double_reversal_is_identity(lines in arb_balanced_lines()) {
        let twice = ReversalService::reversing_lines(&ReversalService::reversing_lines(&lines));
        for (a, b) in lines.iter().zip(&twice) {
            prop_assert_eq!(a.account_id, b.account_id);
            prop_assert_eq!(a.debit, b.debit);
            prop_assert_eq!(a.credit, b.credit);
        }
    }

    /// The reversal stays balanced.
    #[test]
    fn prop_reversal_is_balanced(lines in arb_balanced_lines()) {
        let reversed = ReversalService::reversing_lines(&lines);
        let debit: Decimal = reversed.iter().map(|l| l.debit).sum();
        let credit: Decimal = reversed.iter().map(|l| l.credit).sum();
        prop_assert_eq!(debit, credit);
    }

    /// Posting an entry and its reversal nets every account to zero.
    #[test]
    fn prop_entry_plus_reversal_nets_to_zero(
        lines in arb_balanced_lines(),
        credit_normal in any::<bool>(),
    ) {
        let normal = if credit_normal { NormalBalance::Credit } else { NormalBalance::Debit };
        let mut balances: HashMap<AccountId, AccountBalance> = HashMap::new();
        let reversed = ReversalService::reversing_lines(&lines);
        for line in lines.iter().chain(&reversed) {
            balances
                .entry(line.account_id)
                .or_insert_with(|| AccountBalance::new(line.account_id, normal))
                .apply(line.debit, line.credit);
        }
        for balance in balances.values() {
            prop_assert_eq!(balance.balance, Decimal::ZERO);
        }
    }
}
