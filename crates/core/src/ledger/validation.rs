//! Business rule validation for journal lines.

use rust_decimal::Decimal;
use tally_shared::types::EntityId;

use super::error::{InvalidAccountReason, LedgerError};
use super::types::{AccountInfo, LineInput};

/// Money is kept to whole cents.
const MAX_SCALE: u32 = 2;

/// Validates the amounts of one line.
///
/// # Errors
///
/// Returns `LedgerError::InvalidLine` if an amount is negative, has sub-cent
/// precision, or if the line does not have exactly one non-zero side.
pub fn validate_line_amounts(line_number: usize, line: &LineInput) -> Result<(), LedgerError> {
    let invalid = |reason| LedgerError::InvalidLine {
        line_number,
        reason,
    };

    if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
        return Err(invalid("amounts cannot be negative"));
    }
    if line.debit.normalize().scale() > MAX_SCALE || line.credit.normalize().scale() > MAX_SCALE {
        return Err(invalid("amounts cannot have fractions of a cent"));
    }
    match (line.debit.is_zero(), line.credit.is_zero()) {
        (true, true) => Err(invalid("either debit or credit must be non-zero")),
        (false, false) => Err(invalid("a line cannot have both a debit and a credit")),
        _ => Ok(()),
    }
}

/// Validates that an account may be posted to by `entity_id`.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAccount` with the reason it was refused.
pub fn validate_account(
    entity_id: EntityId,
    line: &LineInput,
    account: Option<AccountInfo>,
) -> Result<(), LedgerError> {
    let reason = match account {
        None => InvalidAccountReason::NotFound,
        Some(info) if info.entity_id != entity_id => InvalidAccountReason::ForeignEntity,
        Some(info) if !info.allow_posting => InvalidAccountReason::NonPosting,
        Some(_) => return Ok(()),
    };
    Err(LedgerError::InvalidAccount {
        account_id: line.account_id,
        reason,
    })
}
