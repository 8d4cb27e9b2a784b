//! Reversing entry construction.
//!
//! A posted entry is never mutated. It is cancelled by a new entry whose
//! lines swap every debit and credit.

use chrono::NaiveDate;
use tally_shared::types::Principal;

use crate::ledger::types::{JournalEntry, LineInput, NewEntry, SourceType, format_entry_number};

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Create reversing lines by swapping debits and credits.
    ///
    /// Accounts and line order are preserved; descriptions are prefixed with
    /// "Reversal: ".
    #[must_use]
    pub fn reversing_lines(lines: &[LineInput]) -> Vec<LineInput> {
        lines
            .iter()
            .map(|line| LineInput {
                account_id: line.account_id,
                debit: line.credit,
                credit: line.debit,
                description: line
                    .description
                    .as_ref()
                    .map(|d| format!("Reversal: {d}")),
            })
            .collect()
    }

    /// Picks the reversal's effective date.
    ///
    /// The original date is kept when it is still postable, otherwise the
    /// current date is used. `None` means both are locked.
    pub fn reversal_date(
        original_date: NaiveDate,
        today: NaiveDate,
        is_postable: impl Fn(NaiveDate) -> bool,
    ) -> Option<NaiveDate> {
        if is_postable(original_date) {
            Some(original_date)
        } else if is_postable(today) {
            Some(today)
        } else {
            None
        }
    }

    /// Builds the reversing entry for `original`, dated `date`.
    #[must_use]
    pub fn build(original: &JournalEntry, date: NaiveDate, reversed_by: Principal) -> NewEntry {
        let memo = if original.memo.is_empty() {
            format!("Reversal of {}", format_entry_number(original.entry_number))
        } else {
            format!(
                "Reversal of {}: {}",
                format_entry_number(original.entry_number),
                original.memo
            )
        };

        NewEntry::manual(
            original.entity_id,
            date,
            memo,
            Self::reversing_lines(&original.line_inputs()),
            reversed_by,
        )
        .with_source(SourceType::Reversal, Some(original.id.to_string()))
    }
}
