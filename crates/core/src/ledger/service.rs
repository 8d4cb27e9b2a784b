//! Ledger service for journal entry validation.
//!
//! This module provides the pure business logic for validating entries
//! before they are persisted to the database.

use rust_decimal::Decimal;
use tally_shared::types::{AccountId, EntityId, JournalEntryId, Principal};

use super::error::LedgerError;
use super::types::{
    AccountInfo, DocumentProposal, EntryTotals, LineInput, NewEntry, SourceType,
};
use super::validation::{validate_account, validate_line_amounts};
use crate::workflow::EntryStatus;

/// Ledger service for journal entry validation.
///
/// This service contains pure business logic with no database dependencies.
pub struct LedgerService;

impl LedgerService {
    /// Validate the lines of an entry before persisting.
    ///
    /// Each line is checked for well-formed amounts and a postable account of
    /// the same entity, then the entry must balance exactly. An entry without
    /// lines is a valid draft; it only fails at submission.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLine`, `InvalidAccount` or `Unbalanced`.
    pub fn validate_lines<A>(
        entity_id: EntityId,
        lines: &[LineInput],
        account_lookup: A,
    ) -> Result<EntryTotals, LedgerError>
    where
        A: Fn(AccountId) -> Option<AccountInfo>,
    {
        for (index, line) in lines.iter().enumerate() {
            validate_line_amounts(index + 1, line)?;
            validate_account(entity_id, line, account_lookup(line.account_id))?;
        }

        let totals = Self::calculate_totals(lines);
        if !totals.is_balanced() {
            return Err(LedgerError::Unbalanced {
                entity_id,
                debit: totals.debit,
                credit: totals.credit,
            });
        }
        Ok(totals)
    }

    /// Calculate entry totals from lines.
    #[must_use]
    pub fn calculate_totals(lines: &[LineInput]) -> EntryTotals {
        EntryTotals::from_amounts(lines.iter().map(|l| (l.debit, l.credit)))
    }

    /// Validate that an entry has something to approve.
    ///
    /// # Errors
    ///
    /// Returns `EmptyEntry` if there are no lines or every amount is zero.
    pub fn validate_submittable(
        entry_id: JournalEntryId,
        totals: EntryTotals,
        line_count: usize,
    ) -> Result<(), LedgerError> {
        if line_count == 0 || (totals.debit.is_zero() && totals.credit.is_zero()) {
            return Err(LedgerError::EmptyEntry { entry_id });
        }
        Ok(())
    }

    /// Validate that an entry can be deleted or edited.
    ///
    /// Only draft entries can be changed; everything else is reversed instead.
    ///
    /// # Errors
    ///
    /// Returns `CanOnlyDeleteDraft` if the entry is not a draft.
    pub fn validate_can_delete(
        entry_id: JournalEntryId,
        status: EntryStatus,
    ) -> Result<(), LedgerError> {
        if status != EntryStatus::Draft {
            return Err(LedgerError::CanOnlyDeleteDraft { entry_id, status });
        }
        Ok(())
    }

    /// Next entry number given the entity's current maximum.
    #[must_use]
    pub fn next_entry_number(current_max: Option<i64>) -> i64 {
        current_max.unwrap_or(0) + 1
    }

    /// Turns a document-extraction proposal into a two-line draft.
    ///
    /// The suggested account is debited and `offset_account` (usually cash or
    /// accounts payable) credited.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLine` if the proposed amount is not positive.
    pub fn entry_from_document(
        entity_id: EntityId,
        proposal: &DocumentProposal,
        offset_account: AccountId,
        created_by: Principal,
    ) -> Result<NewEntry, LedgerError> {
        if proposal.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidLine {
                line_number: 1,
                reason: "document amount must be positive",
            });
        }

        let description = proposal.description.trim().to_string();
        let lines = vec![
            LineInput::debit(proposal.suggested_account, proposal.amount)
                .with_description(description.clone()),
            LineInput::credit(offset_account, proposal.amount).with_description(description.clone()),
        ];

        Ok(NewEntry::manual(entity_id, proposal.date, description, lines, created_by)
            .with_source(SourceType::Document, Some(proposal.document_id.clone())))
    }
}
