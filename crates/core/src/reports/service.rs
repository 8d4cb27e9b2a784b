//! Report generation service.

use rust_decimal::Decimal;

use super::types::{TrialBalance, TrialBalanceLine};
use crate::accounts::{Account, NormalBalance};

/// Service for generating ledger reports.
pub struct ReportService;

impl ReportService {
    /// Builds a trial balance from account running balances.
    ///
    /// Header accounts never carry postings and are left out.
    #[must_use]
    pub fn trial_balance(accounts: &[Account]) -> TrialBalance {
        let mut lines: Vec<TrialBalanceLine> = accounts
            .iter()
            .filter(|a| a.allow_posting)
            .map(|a| TrialBalanceLine {
                account_id: a.id,
                number: a.number.clone(),
                name: a.name.clone(),
                account_type: a.account_type,
                normal_balance: a.normal_balance,
                balance: a.current_balance,
            })
            .collect();
        lines.sort_by(|a, b| a.number.cmp(&b.number));

        let side_total = |side: NormalBalance| -> Decimal {
            lines
                .iter()
                .filter(|l| l.normal_balance == side)
                .map(|l| l.balance)
                .sum()
        };
        let debit_total = side_total(NormalBalance::Debit);
        let credit_total = side_total(NormalBalance::Credit);

        TrialBalance {
            lines,
            debit_total,
            credit_total,
        }
    }
}
