//! Property-based tests for balance rules.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::balance::{AccountBalance, balance_change};
use super::types::NormalBalance;

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_normal() -> impl Strategy<Value = NormalBalance> {
    prop_oneof![Just(NormalBalance::Debit), Just(NormalBalance::Credit)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The two sides always move in opposite directions.
    #[test]
    fn prop_sides_are_mirror_images(debit in arb_amount(), credit in arb_amount()) {
        prop_assert_eq!(
            balance_change(NormalBalance::Debit, debit, credit),
            -balance_change(NormalBalance::Credit, debit, credit)
        );
    }

    /// Applying a line and its swap leaves the balance unchanged.
    #[test]
    fn prop_swapped_line_cancels(
        normal in arb_normal(),
        debit in arb_amount(),
        credit in arb_amount(),
    ) {
        let mut balance = AccountBalance::new(AccountId::new(), normal);
        balance.apply(debit, credit);
        balance.apply(credit, debit);
        prop_assert_eq!(balance.balance, Decimal::ZERO);
    }

    /// The running balance always agrees with the totals.
    #[test]
    fn prop_running_balance_matches_totals(
        normal in arb_normal(),
        lines in prop::collection::vec((arb_amount(), arb_amount()), 0..30),
    ) {
        let mut balance = AccountBalance::new(AccountId::new(), normal);
        for (debit, credit) in lines {
            balance.apply(debit, credit);
        }
        prop_assert_eq!(balance.balance, balance.derived_balance());
    }
}
