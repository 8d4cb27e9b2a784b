//! Reconciliation report arithmetic.

use rust_decimal::Decimal;
use tally_shared::types::within_tolerance;

use super::types::{OutstandingItem, ReportFigures};

/// Pure report calculations.
pub struct ReconciliationMath;

impl ReconciliationMath {
    /// Net debit of cash-account line amounts `(debit, credit)`.
    pub fn gl_balance(lines: impl IntoIterator<Item = (Decimal, Decimal)>) -> Decimal {
        lines
            .into_iter()
            .fold(Decimal::ZERO, |acc, (debit, credit)| acc + debit - credit)
    }

    /// Splits unmatched cash movements into outstanding deposits and checks.
    ///
    /// Incoming items carry the signed net debit of the entry on the cash
    /// account. Positive nets are deposits, negative nets are checks; the
    /// returned items carry absolute amounts. Zero nets are dropped.
    pub fn split_outstanding(
        items: impl IntoIterator<Item = OutstandingItem>,
    ) -> (Vec<OutstandingItem>, Vec<OutstandingItem>) {
        let mut deposits = Vec::new();
        let mut checks = Vec::new();
        for mut item in items {
            if item.amount > Decimal::ZERO {
                deposits.push(item);
            } else if item.amount < Decimal::ZERO {
                item.amount = item.amount.abs();
                checks.push(item);
            }
        }
        (deposits, checks)
    }

    /// Computes the adjusted bank balance and whether it agrees with the GL.
    #[must_use]
    pub fn figures(
        statement_balance: Decimal,
        gl_balance: Decimal,
        deposits: &[OutstandingItem],
        checks: &[OutstandingItem],
        tolerance: Decimal,
    ) -> ReportFigures {
        let outstanding_deposits_total: Decimal = deposits.iter().map(|i| i.amount).sum();
        let outstanding_checks_total: Decimal = checks.iter().map(|i| i.amount).sum();
        let adjusted_bank_balance =
            statement_balance + outstanding_deposits_total - outstanding_checks_total;
        let difference = gl_balance - adjusted_bank_balance;
        ReportFigures {
            outstanding_deposits_total,
            outstanding_checks_total,
            adjusted_bank_balance,
            difference,
            is_reconciled: within_tolerance(gl_balance, adjusted_bank_balance, tolerance),
        }
    }
}
