//! Report data types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use crate::accounts::{AccountType, NormalBalance};

/// One posting account on the trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    /// Account ID.
    pub account_id: AccountId,
    /// Account number.
    pub number: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Normal balance side.
    pub normal_balance: NormalBalance,
    /// Running balance, signed toward the normal side.
    pub balance: Decimal,
}

/// Trial balance grouped by normal-balance side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    /// Posting accounts, ordered by number.
    pub lines: Vec<TrialBalanceLine>,
    /// Sum of debit-normal balances.
    pub debit_total: Decimal,
    /// Sum of credit-normal balances.
    pub credit_total: Decimal,
}

impl TrialBalance {
    /// Whether both sides agree to the cent.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        tally_shared::types::equal_to_the_cent(self.debit_total, self.credit_total)
    }
}
