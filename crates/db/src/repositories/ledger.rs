//! Ledger repository for journal entries.
//!
//! Every state change is a compare-and-swap on `(id, version)` inside one
//! database transaction. Posting updates account balances, also version
//! checked, in the same transaction as the status change, so a reader never
//! sees a posted entry with stale balances.

use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::accounts::{NormalBalance, balance_change};
use tally_core::audit::{AuditAction, AuditRecord, SubjectKind};
use tally_core::ledger::{
    AccountInfo, DocumentProposal, EntryFilter, JournalEntry, JournalLine, LedgerError,
    LedgerService, LineInput, NewEntry, SourceType, fiscal_year_of,
};
use tally_core::period::DateRange;
use tally_core::workflow::{
    AuthorizationPolicy, EntryState, EntryStatus, ReversalService, TransitionContext,
    WorkflowAction, WorkflowService,
};
use tally_shared::types::{
    AccountId, EntityId, JournalEntryId, JournalLineId, PeriodId, Principal,
};

use super::audit::{self, AuditEntry};
use super::period::{is_postable_in, lock_periods_in, period_for_date_in};
use super::{corrupt, is_unique_violation, money, now, principal, utc};
use crate::entities::{accounts, journal_entries, journal_entry_lines};

fn db_err(err: DbErr) -> LedgerError {
    LedgerError::Database(err.to_string())
}

/// A reversed entry and the reversing entry that cancels it.
#[derive(Debug, Clone)]
pub struct ReversalOutcome {
    /// The original entry, now `reversed`.
    pub original: JournalEntry,
    /// The new posted reversing entry.
    pub reversal: JournalEntry,
}

/// Journal entry repository.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
    policy: AuthorizationPolicy,
}

impl LedgerRepository {
    /// Creates a new ledger repository approving against `policy`.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: AuthorizationPolicy) -> Self {
        Self { db, policy }
    }

    /// The authorization policy approvals are checked against.
    #[must_use]
    pub const fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Creates a draft entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLine`, `InvalidAccount`, `Unbalanced`, `PeriodLocked`
    /// or `NoPeriod`.
    pub async fn create_entry(&self, new: NewEntry) -> Result<JournalEntry, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let period_id = validate_new_entry(&txn, &new).await?;
        let entry_id = insert_entry(&txn, &new, &EntryState::Draft, period_id, None).await?;
        append_entry_audit(&txn, entry_id, new.entity_id, AuditAction::Created, &new.created_by, None)
            .await?;
        let entry = load_entry(&txn, entry_id).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            entry_id = %entry.id,
            entity_id = %entry.entity_id,
            entry_number = entry.entry_number,
            source_type = %entry.source_type,
            principal = %entry.created_by,
            "Journal entry created"
        );
        Ok(entry)
    }

    /// Creates a draft from a document-extraction proposal, crediting
    /// `offset_account`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_entry`].
    pub async fn create_from_document(
        &self,
        entity_id: EntityId,
        proposal: &DocumentProposal,
        offset_account: AccountId,
        created_by: Principal,
    ) -> Result<JournalEntry, LedgerError> {
        let new = LedgerService::entry_from_document(entity_id, proposal, offset_account, created_by)?;
        self.create_entry(new).await
    }

    /// Replaces the lines of a draft.
    ///
    /// # Errors
    ///
    /// Returns `CanOnlyDeleteDraft` unless the entry is a draft, line
    /// validation errors, or `ConcurrentModification`.
    pub async fn replace_draft_lines(
        &self,
        entry_id: JournalEntryId,
        lines: Vec<LineInput>,
    ) -> Result<JournalEntry, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let model = find_entry_model(&txn, entry_id).await?;
        LedgerService::validate_can_delete(entry_id, parse_status(&model.status).map_err(db_err)?)?;

        let entity_id = EntityId::from_uuid(model.entity_id);
        let infos = account_infos(&txn, &lines).await?;
        LedgerService::validate_lines(entity_id, &lines, |id| infos.get(&id).copied())?;

        bump_version(&txn, &model).await?;
        journal_entry_lines::Entity::delete_many()
            .filter(journal_entry_lines::Column::EntryId.eq(model.id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        insert_lines(&txn, entry_id, &lines).await?;
        let entry = load_entry(&txn, entry_id).await?;
        txn.commit().await.map_err(db_err)?;

        debug!(entry_id = %entry_id, lines = entry.lines.len(), "Draft lines replaced");
        Ok(entry)
    }

    /// Deletes a draft and its lines.
    ///
    /// # Errors
    ///
    /// Returns `CanOnlyDeleteDraft` unless the entry is a draft.
    pub async fn delete_draft(&self, entry_id: JournalEntryId) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let model = find_entry_model(&txn, entry_id).await?;
        LedgerService::validate_can_delete(entry_id, parse_status(&model.status).map_err(db_err)?)?;

        journal_entry_lines::Entity::delete_many()
            .filter(journal_entry_lines::Column::EntryId.eq(model.id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let deleted = journal_entries::Entity::delete_many()
            .filter(journal_entries::Column::Id.eq(model.id))
            .filter(journal_entries::Column::Version.eq(model.version))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if deleted.rows_affected == 0 {
            return Err(LedgerError::entry_conflict(entry_id));
        }
        txn.commit().await.map_err(db_err)?;

        info!(entry_id = %entry_id, "Draft entry deleted");
        Ok(())
    }

    /// Submits a draft for approval.
    ///
    /// # Errors
    ///
    /// Returns `Workflow(InvalidTransition)` unless the entry is a draft, or
    /// `EmptyEntry` if it has nothing to approve.
    pub async fn submit(
        &self,
        entry_id: JournalEntryId,
        principal: Principal,
    ) -> Result<JournalEntry, LedgerError> {
        self.apply(entry_id, WorkflowAction::Submit { principal }).await
    }

    /// Approves a pending entry; the final approval posts it.
    ///
    /// # Errors
    ///
    /// Returns `Workflow` errors (`SelfApproval`, `Unauthorized`,
    /// `RepeatApprover`, `InvalidTransition`), `PeriodLocked`, or
    /// `ConcurrentModification` when another transition won the race.
    pub async fn approve(
        &self,
        entry_id: JournalEntryId,
        principal: Principal,
    ) -> Result<JournalEntry, LedgerError> {
        self.apply(entry_id, WorkflowAction::Approve { principal }).await
    }

    /// Rejects a pending entry.
    ///
    /// # Errors
    ///
    /// Returns `Workflow` errors (`SelfRejection`, `Unauthorized`,
    /// `RejectionReasonRequired`, `InvalidTransition`).
    pub async fn reject(
        &self,
        entry_id: JournalEntryId,
        principal: Principal,
        reason: &str,
    ) -> Result<JournalEntry, LedgerError> {
        self.apply(
            entry_id,
            WorkflowAction::Reject {
                principal,
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// Reverses a posted entry as of today.
    ///
    /// # Errors
    ///
    /// See [`Self::reverse_on`].
    pub async fn reverse(
        &self,
        entry_id: JournalEntryId,
        principal: Principal,
    ) -> Result<ReversalOutcome, LedgerError> {
        self.reverse_on(entry_id, principal, Utc::now().date_naive())
            .await
    }

    /// Reverses a posted entry, treating `today` as the current date.
    ///
    /// The reversal is dated like the original when that date is postable,
    /// else `today`. It is posted in the same transaction that marks the
    /// original reversed.
    ///
    /// # Errors
    ///
    /// Returns `Workflow(InvalidTransition)` unless the entry is posted,
    /// `Workflow(Unauthorized)`, `PeriodLocked` when both dates are locked,
    /// or `NoPeriod`.
    pub async fn reverse_on(
        &self,
        entry_id: JournalEntryId,
        principal: Principal,
        today: NaiveDate,
    ) -> Result<ReversalOutcome, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let model = find_entry_model(&txn, entry_id).await?;
        let original = load_entry(&txn, entry_id).await?;

        let action = WorkflowAction::Reverse {
            principal: principal.clone(),
        };
        let transition = WorkflowService::transition(
            &original.state,
            &action,
            TransitionContext {
                created_by: &original.created_by,
                policy: &self.policy,
            },
        )
        .map_err(|e| LedgerError::workflow(entry_id, e))?;

        let entity_id = original.entity_id;
        let span = DateRange {
            start: original.entry_date.min(today),
            end: original.entry_date.max(today),
        };
        lock_periods_in(&txn, entity_id, Some(span)).await.map_err(db_err)?;
        let original_open = is_postable_in(&txn, entity_id, original.entry_date)
            .await
            .map_err(db_err)?;
        let today_open = is_postable_in(&txn, entity_id, today).await.map_err(db_err)?;
        let date = ReversalService::reversal_date(original.entry_date, today, |d| {
            if d == original.entry_date {
                original_open
            } else {
                today_open
            }
        })
        .ok_or(LedgerError::PeriodLocked { entity_id, date: today })?;

        let new = ReversalService::build(&original, date, principal.clone());
        let reversal_id = insert_posted_entry(&txn, &new, Some(entry_id)).await?;

        update_state(&txn, &model, &transition.next, false).await?;
        for action in transition.audit {
            append_entry_audit(
                &txn,
                entry_id,
                entity_id,
                action,
                &principal,
                Some(format!("Reversed by entry {reversal_id}")),
            )
            .await?;
        }

        let original = load_entry(&txn, entry_id).await?;
        let reversal = load_entry(&txn, reversal_id).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            entry_id = %entry_id,
            reversal_id = %reversal_id,
            reversal_date = %date,
            principal = %principal,
            "Journal entry reversed"
        );
        Ok(ReversalOutcome { original, reversal })
    }

    /// Gets an entry with its lines.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if it does not exist.
    pub async fn get_entry(&self, entry_id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        load_entry(&self.db, entry_id).await
    }

    /// Lists an entity's entries by date and number.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_entries(
        &self,
        entity_id: EntityId,
        filter: &EntryFilter,
    ) -> Result<Vec<JournalEntry>, LedgerError> {
        let mut query = journal_entries::Entity::find()
            .filter(journal_entries::Column::EntityId.eq(entity_id.into_inner()));
        if let Some(status) = filter.status {
            query = query.filter(journal_entries::Column::Status.eq(status.as_str()));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(journal_entries::Column::EntryDate.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(journal_entries::Column::EntryDate.lte(to));
        }
        if let Some(source_type) = filter.source_type {
            query = query.filter(journal_entries::Column::SourceType.eq(source_type.as_str()));
        }

        let models = query
            .order_by_asc(journal_entries::Column::EntryDate)
            .order_by_asc(journal_entries::Column::EntryNumber)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        entries_with_lines(&self.db, models).await
    }

    /// The reversing entry of `entry_id`, if it has been reversed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn reversal_of(
        &self,
        entry_id: JournalEntryId,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        let model = journal_entries::Entity::find()
            .filter(journal_entries::Column::ReversesEntryId.eq(entry_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match model {
            Some(m) => load_entry(&self.db, JournalEntryId::from_uuid(m.id))
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Audit trail of an entry, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn audit_trail(&self, entry_id: JournalEntryId) -> Result<Vec<AuditRecord>, LedgerError> {
        audit::trail(&self.db, entry_id.into_inner())
            .await
            .map_err(db_err)
    }

    async fn apply(
        &self,
        entry_id: JournalEntryId,
        action: WorkflowAction,
    ) -> Result<JournalEntry, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let model = find_entry_model(&txn, entry_id).await?;
        let entry = load_entry(&txn, entry_id).await?;

        let transition = WorkflowService::transition(
            &entry.state,
            &action,
            TransitionContext {
                created_by: &entry.created_by,
                policy: &self.policy,
            },
        )
        .map_err(|e| LedgerError::workflow(entry_id, e))?;

        match action {
            WorkflowAction::Submit { .. } => {
                LedgerService::validate_submittable(entry_id, entry.totals(), entry.lines.len())?;
            }
            WorkflowAction::Approve { .. } => {
                lock_periods_in(&txn, entry.entity_id, Some(DateRange::day(entry.entry_date)))
                    .await
                    .map_err(db_err)?;
                if !is_postable_in(&txn, entry.entity_id, entry.entry_date)
                    .await
                    .map_err(db_err)?
                {
                    return Err(LedgerError::PeriodLocked {
                        entity_id: entry.entity_id,
                        date: entry.entry_date,
                    });
                }
            }
            WorkflowAction::Reject { .. } | WorkflowAction::Reverse { .. } => {}
        }

        let posts = transition.posts();
        update_state(&txn, &model, &transition.next, posts).await?;
        if posts {
            apply_balances(&txn, &entry.line_inputs()).await?;
        }

        let comment = match &action {
            WorkflowAction::Reject { reason, .. } => Some(reason.trim().to_string()),
            _ => None,
        };
        for audit_action in &transition.audit {
            append_entry_audit(
                &txn,
                entry_id,
                entry.entity_id,
                *audit_action,
                action.principal(),
                comment.clone(),
            )
            .await?;
        }

        let updated = load_entry(&txn, entry_id).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            entry_id = %entry_id,
            entity_id = %entry.entity_id,
            action = action.name(),
            principal = %action.principal(),
            from = %entry.status(),
            to = %updated.status(),
            "Journal entry transitioned"
        );
        if posts {
            info!(entry_id = %entry_id, lines = updated.lines.len(), "Journal entry posted");
        }
        Ok(updated)
    }
}

/// Validates a new entry against accounts, locks and periods.
///
/// Returns the period containing the entry date.
pub(crate) async fn validate_new_entry<C: ConnectionTrait>(
    conn: &C,
    new: &NewEntry,
) -> Result<PeriodId, LedgerError> {
    lock_periods_in(conn, new.entity_id, Some(DateRange::day(new.entry_date)))
        .await
        .map_err(db_err)?;
    let infos = account_infos(conn, &new.lines).await?;
    LedgerService::validate_lines(new.entity_id, &new.lines, |id| infos.get(&id).copied())?;

    if !is_postable_in(conn, new.entity_id, new.entry_date)
        .await
        .map_err(db_err)?
    {
        return Err(LedgerError::PeriodLocked {
            entity_id: new.entity_id,
            date: new.entry_date,
        });
    }

    let period = period_for_date_in(conn, new.entity_id, new.entry_date)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::NoPeriod {
            entity_id: new.entity_id,
            date: new.entry_date,
        })?;
    Ok(PeriodId::from_uuid(period.id))
}

/// Validates, inserts and immediately posts a system-generated entry
/// (reversal or closing entry).
pub(crate) async fn insert_posted_entry<C: ConnectionTrait>(
    conn: &C,
    new: &NewEntry,
    reverses: Option<JournalEntryId>,
) -> Result<JournalEntryId, LedgerError> {
    let period_id = validate_new_entry(conn, new).await?;
    let state = EntryState::Posted {
        approvers: Vec::new(),
    };
    let entry_id = insert_entry(conn, new, &state, period_id, reverses).await?;
    apply_balances(conn, &new.lines).await?;

    let comment = match reverses {
        Some(original) => Some(format!("Reversal of entry {original}")),
        None => Some(format!("System generated {} entry", new.source_type)),
    };
    for action in [AuditAction::Created, AuditAction::Posted] {
        append_entry_audit(conn, entry_id, new.entity_id, action, &new.created_by, comment.clone())
            .await?;
    }
    Ok(entry_id)
}

async fn account_infos<C: ConnectionTrait>(
    conn: &C,
    lines: &[LineInput],
) -> Result<HashMap<AccountId, AccountInfo>, LedgerError> {
    let ids: Vec<Uuid> = lines.iter().map(|l| l.account_id.into_inner()).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let models = accounts::Entity::find()
        .filter(accounts::Column::Id.is_in(ids))
        .all(conn)
        .await
        .map_err(db_err)?;
    Ok(models
        .into_iter()
        .map(|m| {
            let id = AccountId::from_uuid(m.id);
            (
                id,
                AccountInfo {
                    id,
                    entity_id: EntityId::from_uuid(m.entity_id),
                    allow_posting: m.allow_posting,
                },
            )
        })
        .collect())
}

async fn insert_entry<C: ConnectionTrait>(
    conn: &C,
    new: &NewEntry,
    state: &EntryState,
    period_id: PeriodId,
    reverses: Option<JournalEntryId>,
) -> Result<JournalEntryId, LedgerError> {
    let current_max: Option<i64> = journal_entries::Entity::find()
        .select_only()
        .column(journal_entries::Column::EntryNumber)
        .filter(journal_entries::Column::EntityId.eq(new.entity_id.into_inner()))
        .order_by_desc(journal_entries::Column::EntryNumber)
        .into_tuple()
        .one(conn)
        .await
        .map_err(db_err)?;
    let entry_number = LedgerService::next_entry_number(current_max);

    let id = JournalEntryId::new();
    let ts = now();
    let columns = StateColumns::for_new(state);
    let posted_at: Option<DateTimeWithTimeZone> = state.status().affects_balances().then_some(ts);

    journal_entries::ActiveModel {
        id: Set(id.into_inner()),
        entity_id: Set(new.entity_id.into_inner()),
        entry_number: Set(entry_number),
        entry_date: Set(new.entry_date),
        fiscal_year: Set(fiscal_year_of(new.entry_date)),
        period_id: Set(period_id.into_inner()),
        memo: Set(new.memo.clone()),
        source_type: Set(new.source_type.as_str().to_string()),
        source_id: Set(new.source_id.clone()),
        status: Set(columns.status.as_str().to_string()),
        created_by: Set(new.created_by.as_str().to_string()),
        first_approved_by: Set(columns.first_approved_by),
        final_approved_by: Set(columns.final_approved_by),
        rejected_by: Set(columns.rejected_by),
        rejection_reason: Set(columns.rejection_reason),
        reversed_by: Set(columns.reversed_by),
        reverses_entry_id: Set(reverses.map(JournalEntryId::into_inner)),
        posted_at: Set(posted_at),
        version: Set(0),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            warn!(entity_id = %new.entity_id, entry_number, "Entry number taken concurrently");
            LedgerError::ConcurrentModification {
                resource: "entry number of entity",
                id: new.entity_id.into_inner(),
            }
        } else {
            db_err(e)
        }
    })?;

    insert_lines(conn, id, &new.lines).await?;
    Ok(id)
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    entry_id: JournalEntryId,
    lines: &[LineInput],
) -> Result<(), LedgerError> {
    for (index, line) in lines.iter().enumerate() {
        let line_number = i32::try_from(index + 1)
            .map_err(|_| LedgerError::InvalidLine {
                line_number: index + 1,
                reason: "too many lines",
            })?;
        journal_entry_lines::ActiveModel {
            id: Set(JournalLineId::new().into_inner()),
            entry_id: Set(entry_id.into_inner()),
            line_number: Set(line_number),
            account_id: Set(line.account_id.into_inner()),
            debit: Set(line.debit),
            credit: Set(line.credit),
            description: Set(line.description.clone()),
        }
        .insert(conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

/// Applies posted lines to account running balances.
///
/// Accounts are updated in id order, each with a version check.
async fn apply_balances<C: ConnectionTrait>(conn: &C, lines: &[LineInput]) -> Result<(), LedgerError> {
    let mut per_account: BTreeMap<AccountId, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        let totals = per_account
            .entry(line.account_id)
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        totals.0 += line.debit;
        totals.1 += line.credit;
    }

    for (account_id, (debit, credit)) in per_account {
        let account = accounts::Entity::find_by_id(account_id.into_inner())
            .one(conn)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let normal = NormalBalance::parse(&account.normal_balance)
            .ok_or_else(|| db_err(corrupt("accounts.normal_balance", &account.normal_balance)))?;
        let balance = money(account.current_balance) + balance_change(normal, debit, credit);

        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::CurrentBalance, Expr::value(balance))
            .col_expr(accounts::Column::Version, Expr::value(account.version + 1))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now()))
            .filter(accounts::Column::Id.eq(account.id))
            .filter(accounts::Column::Version.eq(account.version))
            .exec(conn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(LedgerError::account_conflict(account_id));
        }
    }
    Ok(())
}

/// Persisted columns describing an entry's state.
struct StateColumns {
    status: EntryStatus,
    first_approved_by: Option<String>,
    final_approved_by: Option<String>,
    rejected_by: Option<String>,
    rejection_reason: Option<String>,
    reversed_by: Option<String>,
}

impl StateColumns {
    fn for_new(state: &EntryState) -> Self {
        Self::from_state(state, None, None)
    }

    /// `first` and `last` are the approvals already stored on the row; they
    /// survive into states that do not carry them (rejected, reversed).
    fn from_state(state: &EntryState, first: Option<&str>, last: Option<&str>) -> Self {
        let owned = |p: &Principal| Some(p.as_str().to_string());
        let mut columns = Self {
            status: state.status(),
            first_approved_by: first.map(str::to_string),
            final_approved_by: last.map(str::to_string),
            rejected_by: None,
            rejection_reason: None,
            reversed_by: None,
        };
        match state {
            EntryState::Draft | EntryState::PendingFirstApproval => {
                columns.first_approved_by = None;
                columns.final_approved_by = None;
            }
            EntryState::PendingFinalApproval { first_approver } => {
                columns.first_approved_by = owned(first_approver);
                columns.final_approved_by = None;
            }
            EntryState::Posted { approvers } => {
                columns.first_approved_by = approvers.first().and_then(owned);
                columns.final_approved_by = approvers.get(1).and_then(owned);
            }
            EntryState::Rejected { by, reason } => {
                columns.rejected_by = owned(by);
                columns.rejection_reason = Some(reason.clone());
            }
            EntryState::Reversed { by } => {
                columns.reversed_by = owned(by);
            }
        }
        columns
    }
}

/// Compare-and-swap of an entry's state columns.
async fn update_state<C: ConnectionTrait>(
    conn: &C,
    model: &journal_entries::Model,
    next: &EntryState,
    posts: bool,
) -> Result<(), LedgerError> {
    let columns = StateColumns::from_state(
        next,
        model.first_approved_by.as_deref(),
        model.final_approved_by.as_deref(),
    );
    let ts = now();
    let mut update = journal_entries::Entity::update_many()
        .col_expr(journal_entries::Column::Status, Expr::value(columns.status.as_str()))
        .col_expr(
            journal_entries::Column::FirstApprovedBy,
            Expr::value(columns.first_approved_by),
        )
        .col_expr(
            journal_entries::Column::FinalApprovedBy,
            Expr::value(columns.final_approved_by),
        )
        .col_expr(journal_entries::Column::RejectedBy, Expr::value(columns.rejected_by))
        .col_expr(
            journal_entries::Column::RejectionReason,
            Expr::value(columns.rejection_reason),
        )
        .col_expr(journal_entries::Column::ReversedBy, Expr::value(columns.reversed_by))
        .col_expr(journal_entries::Column::Version, Expr::value(model.version + 1))
        .col_expr(journal_entries::Column::UpdatedAt, Expr::value(ts));
    if posts {
        update = update.col_expr(journal_entries::Column::PostedAt, Expr::value(ts));
    }

    let result = update
        .filter(journal_entries::Column::Id.eq(model.id))
        .filter(journal_entries::Column::Version.eq(model.version))
        .exec(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected == 0 {
        warn!(entry_id = %model.id, version = model.version, "Entry version check failed");
        return Err(LedgerError::entry_conflict(JournalEntryId::from_uuid(model.id)));
    }
    Ok(())
}

/// Version bump without a state change (draft edits).
async fn bump_version<C: ConnectionTrait>(
    conn: &C,
    model: &journal_entries::Model,
) -> Result<(), LedgerError> {
    let result = journal_entries::Entity::update_many()
        .col_expr(journal_entries::Column::Version, Expr::value(model.version + 1))
        .col_expr(journal_entries::Column::UpdatedAt, Expr::value(now()))
        .filter(journal_entries::Column::Id.eq(model.id))
        .filter(journal_entries::Column::Version.eq(model.version))
        .exec(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected == 0 {
        return Err(LedgerError::entry_conflict(JournalEntryId::from_uuid(model.id)));
    }
    Ok(())
}

async fn append_entry_audit<C: ConnectionTrait>(
    conn: &C,
    entry_id: JournalEntryId,
    entity_id: EntityId,
    action: AuditAction,
    principal: &Principal,
    comment: Option<String>,
) -> Result<(), LedgerError> {
    audit::append(
        conn,
        AuditEntry {
            subject_kind: SubjectKind::JournalEntry,
            subject_id: entry_id.into_inner(),
            entity_id,
            action,
            principal,
            comment,
        },
    )
    .await
    .map_err(db_err)
}

async fn find_entry_model<C: ConnectionTrait>(
    conn: &C,
    entry_id: JournalEntryId,
) -> Result<journal_entries::Model, LedgerError> {
    journal_entries::Entity::find_by_id(entry_id.into_inner())
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::EntryNotFound(entry_id))
}

/// Loads an entry with its lines.
pub(crate) async fn load_entry<C: ConnectionTrait>(
    conn: &C,
    entry_id: JournalEntryId,
) -> Result<JournalEntry, LedgerError> {
    let model = find_entry_model(conn, entry_id).await?;
    let lines = journal_entry_lines::Entity::find()
        .filter(journal_entry_lines::Column::EntryId.eq(model.id))
        .order_by_asc(journal_entry_lines::Column::LineNumber)
        .all(conn)
        .await
        .map_err(db_err)?;
    entry_from_model(model, lines).map_err(db_err)
}

/// Attaches lines to many entry rows with one line query.
pub(crate) async fn entries_with_lines<C: ConnectionTrait>(
    conn: &C,
    models: Vec<journal_entries::Model>,
) -> Result<Vec<JournalEntry>, LedgerError> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut by_entry: HashMap<Uuid, Vec<journal_entry_lines::Model>> = HashMap::new();
    for line in journal_entry_lines::Entity::find()
        .filter(journal_entry_lines::Column::EntryId.is_in(ids))
        .order_by_asc(journal_entry_lines::Column::LineNumber)
        .all(conn)
        .await
        .map_err(db_err)?
    {
        by_entry.entry(line.entry_id).or_default().push(line);
    }

    models
        .into_iter()
        .map(|m| {
            let lines = by_entry.remove(&m.id).unwrap_or_default();
            entry_from_model(m, lines).map_err(db_err)
        })
        .collect()
}

pub(crate) fn parse_status(status: &str) -> Result<EntryStatus, DbErr> {
    EntryStatus::parse(status).ok_or_else(|| corrupt("journal_entries.status", status))
}

fn state_from_model(model: &journal_entries::Model) -> Result<EntryState, DbErr> {
    let required = |column: &str, value: Option<&str>| -> Result<Principal, DbErr> {
        principal(column, value.ok_or_else(|| corrupt(column, "NULL"))?)
    };

    Ok(match parse_status(&model.status)? {
        EntryStatus::Draft => EntryState::Draft,
        EntryStatus::PendingFirstApproval => EntryState::PendingFirstApproval,
        EntryStatus::PendingFinalApproval => EntryState::PendingFinalApproval {
            first_approver: required(
                "journal_entries.first_approved_by",
                model.first_approved_by.as_deref(),
            )?,
        },
        EntryStatus::Posted => EntryState::Posted {
            approvers: [&model.first_approved_by, &model.final_approved_by]
                .into_iter()
                .flatten()
                .map(|p| principal("journal_entries.approved_by", p))
                .collect::<Result<_, _>>()?,
        },
        EntryStatus::Rejected => EntryState::Rejected {
            by: required("journal_entries.rejected_by", model.rejected_by.as_deref())?,
            reason: model.rejection_reason.clone().unwrap_or_default(),
        },
        EntryStatus::Reversed => EntryState::Reversed {
            by: required("journal_entries.reversed_by", model.reversed_by.as_deref())?,
        },
    })
}

fn entry_from_model(
    model: journal_entries::Model,
    lines: Vec<journal_entry_lines::Model>,
) -> Result<JournalEntry, DbErr> {
    let state = state_from_model(&model)?;
    Ok(JournalEntry {
        id: JournalEntryId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        entry_number: model.entry_number,
        entry_date: model.entry_date,
        fiscal_year: model.fiscal_year,
        period_id: PeriodId::from_uuid(model.period_id),
        source_type: SourceType::parse(&model.source_type)
            .ok_or_else(|| corrupt("journal_entries.source_type", &model.source_type))?,
        created_by: principal("journal_entries.created_by", &model.created_by)?,
        reverses_entry_id: model.reverses_entry_id.map(JournalEntryId::from_uuid),
        posted_at: model.posted_at.map(utc),
        created_at: utc(model.created_at),
        memo: model.memo,
        source_id: model.source_id,
        state,
        version: model.version,
        lines: lines
            .into_iter()
            .map(|l| JournalLine {
                id: JournalLineId::from_uuid(l.id),
                line_number: l.line_number,
                account_id: AccountId::from_uuid(l.account_id),
                debit: money(l.debit),
                credit: money(l.credit),
                description: l.description,
            })
            .collect(),
    })
}
