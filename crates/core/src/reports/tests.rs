//! Property-based tests for the trial balance.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_shared::types::{AccountId, EntityId};

use super::service::ReportService;
use crate::accounts::{Account, AccountType, balance_change};

const TYPES: [AccountType; 5] = [
    AccountType::Asset,
    AccountType::Liability,
    AccountType::Equity,
    AccountType::Revenue,
    AccountType::Expense,
];

fn chart(entity_id: EntityId) -> Vec<Account> {
    TYPES
        .iter()
        .enumerate()
        .map(|(i, account_type)| Account {
            id: AccountId::new(),
            entity_id,
            number: format!("{}000", i + 1),
            name: account_type.to_string(),
            account_type: *account_type,
            normal_balance: account_type.normal_balance(),
            allow_posting: true,
            requires_depreciation: false,
            current_balance: Decimal::ZERO,
            version: 0,
        })
        .collect()
}

proptest! {
    /// Posting any sequence of balanced two-line entries keeps the trial
    /// balance in balance.
    #[test]
    fn prop_balanced_postings_keep_trial_balance(
        postings in prop::collection::vec((0usize..5, 0usize..5, 1i64..10_000_000), 1..30),
    ) {
        let mut accounts = chart(EntityId::new());
        for (debit_idx, credit_idx, cents) in postings {
            let amount = Decimal::new(cents, 2);
            let debit = &mut accounts[debit_idx];
            debit.current_balance += balance_change(debit.normal_balance, amount, Decimal::ZERO);
            let credit = &mut accounts[credit_idx];
            credit.current_balance += balance_change(credit.normal_balance, Decimal::ZERO, amount);
        }

        let tb = ReportService::trial_balance(&accounts);
        prop_assert!(tb.is_balanced());
        prop_assert_eq!(tb.lines.len(), 5);
    }
}

#[test]
fn test_trial_balance_skips_headers_and_detects_imbalance() {
    let mut accounts = chart(EntityId::new());
    accounts[0].current_balance = dec!(100);
    accounts[3].current_balance = dec!(99.99);
    let mut header = accounts[0].clone();
    header.id = AccountId::new();
    header.number = "0999".into();
    header.allow_posting = false;
    header.current_balance = dec!(5000);
    accounts.push(header);

    let tb = ReportService::trial_balance(&accounts);
    assert_eq!(tb.lines.len(), 5);
    assert_eq!(tb.lines[0].number, "1000");
    assert_eq!(tb.debit_total, dec!(100));
    assert_eq!(tb.credit_total, dec!(99.99));
    assert!(!tb.is_balanced());
}
