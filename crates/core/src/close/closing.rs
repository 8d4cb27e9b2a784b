//! Closing entry generation.

use rust_decimal::Decimal;
use tally_shared::types::{AccountId, EntityId, Principal};

use super::CloseService;
use super::error::CloseError;
use crate::accounts::{Account, AccountType};
use crate::ledger::{LineInput, NewEntry, SourceType};
use crate::period::AccountingPeriod;

/// Posted activity of one account inside the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosingActivity {
    /// The account.
    pub account_id: AccountId,
    /// Its classification.
    pub account_type: AccountType,
    /// Sum of posted debits in the period.
    pub debit: Decimal,
    /// Sum of posted credits in the period.
    pub credit: Decimal,
}

impl CloseService {
    /// Lines zeroing each revenue and expense account's net activity into
    /// retained earnings.
    ///
    /// Returns no lines when there is nothing to close.
    #[must_use]
    pub fn closing_lines(activity: &[ClosingActivity], retained_earnings: AccountId) -> Vec<LineInput> {
        let mut lines = Vec::new();
        let mut total_net = Decimal::ZERO;

        for a in activity.iter().filter(|a| a.account_type.is_temporary()) {
            let net = a.debit - a.credit;
            if net.is_zero() {
                continue;
            }
            total_net += net;
            let line = if net > Decimal::ZERO {
                LineInput::credit(a.account_id, net)
            } else {
                LineInput::debit(a.account_id, -net)
            };
            lines.push(line.with_description("Close to retained earnings"));
        }

        if lines.is_empty() {
            return lines;
        }
        if total_net > Decimal::ZERO {
            lines.push(LineInput::debit(retained_earnings, total_net).with_description("Net loss"));
        } else if total_net < Decimal::ZERO {
            lines.push(
                LineInput::credit(retained_earnings, -total_net).with_description("Net income"),
            );
        }
        lines
    }

    /// Builds the closing entry for a period, dated its last day.
    #[must_use]
    pub fn closing_entry(
        entity_id: EntityId,
        period: &AccountingPeriod,
        activity: &[ClosingActivity],
        retained_earnings: AccountId,
        closed_by: Principal,
    ) -> Option<NewEntry> {
        let lines = Self::closing_lines(activity, retained_earnings);
        if lines.is_empty() {
            return None;
        }
        Some(
            NewEntry::manual(
                entity_id,
                period.end_date,
                format!("Closing entry for {}", period.name),
                lines,
                closed_by,
            )
            .with_source(SourceType::Closing, Some(period.id.to_string())),
        )
    }

    /// Checks that an account can receive the closing entry.
    ///
    /// # Errors
    ///
    /// Returns `CloseError::InvalidRetainedEarnings` unless the account is a
    /// posting equity account of the entity.
    pub fn validate_retained_earnings(
        entity_id: EntityId,
        account_id: AccountId,
        account: Option<&Account>,
    ) -> Result<(), CloseError> {
        let reason = match account {
            None => "account not found",
            Some(a) if a.entity_id != entity_id => "account belongs to another entity",
            Some(a) if a.account_type != AccountType::Equity => "account is not an equity account",
            Some(a) if !a.allow_posting => "account does not allow posting",
            Some(_) => return Ok(()),
        };
        Err(CloseError::InvalidRetainedEarnings { account_id, reason })
    }
}
