//! Account balance calculations.
//!
//! Debit-normal accounts move by `debit - credit`, credit-normal accounts by
//! `credit - debit`. Running balances are only ever changed by posting.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use super::types::NormalBalance;

/// Calculates the balance change a line causes on an account.
#[must_use]
pub fn balance_change(normal: NormalBalance, debit: Decimal, credit: Decimal) -> Decimal {
    match normal {
        NormalBalance::Debit => debit - credit,
        NormalBalance::Credit => credit - debit,
    }
}

/// Account balance with the posted totals behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Natural increasing side.
    pub normal_balance: NormalBalance,
    /// Total posted debits.
    pub debit_total: Decimal,
    /// Total posted credits.
    pub credit_total: Decimal,
    /// Running balance stored on the account.
    pub balance: Decimal,
}

impl AccountBalance {
    /// Creates an empty balance.
    #[must_use]
    pub fn new(account_id: AccountId, normal_balance: NormalBalance) -> Self {
        Self {
            account_id,
            normal_balance,
            debit_total: Decimal::ZERO,
            credit_total: Decimal::ZERO,
            balance: Decimal::ZERO,
        }
    }

    /// Applies one posted line.
    pub fn apply(&mut self, debit: Decimal, credit: Decimal) {
        self.debit_total += debit;
        self.credit_total += credit;
        self.balance += balance_change(self.normal_balance, debit, credit);
    }

    /// Balance recomputed from the totals alone.
    #[must_use]
    pub fn derived_balance(&self) -> Decimal {
        balance_change(self.normal_balance, self.debit_total, self.credit_total)
    }
}
