//! Period close repository.
//!
//! `close` gathers the checklist input and applies the close inside one
//! database transaction, so a period either ends up closed and locked with
//! its history row, or is left exactly as it was.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{info, warn};
use uuid::Uuid;

use tally_core::accounts::Account;
use tally_core::audit::{AuditAction, SubjectKind};
use tally_core::close::{
    Checklist, ChecklistInput, CloseAction, CloseError, CloseOptions, CloseOutcome, CloseRecord,
    CloseService, ClosingActivity, ReportCoverage,
};
use tally_core::ledger::SourceType;
use tally_core::period::{AccountingPeriod, PeriodError, PeriodService, PeriodStatus};
use tally_core::reports::ReportService;
use tally_core::workflow::EntryStatus;
use tally_shared::types::{
    AccountId, BankAccountId, CloseRecordId, EntityId, JournalEntryId, PeriodId, Principal,
};

use super::account::entity_accounts;
use super::audit::{self, AuditEntry};
use super::ledger::insert_posted_entry;
use super::period::{
    create_lock_in, deactivate_lock_in, lock_periods_in, period_from_model, period_locks_in,
};
use super::{corrupt, money, now, principal, utc};
use crate::entities::{
    accounting_periods, bank_accounts, journal_entries, journal_entry_lines,
    period_close_history, reconciliation_reports,
};

fn db_err(err: DbErr) -> CloseError {
    CloseError::Database(err.to_string())
}

fn record_from_model(model: period_close_history::Model) -> Result<CloseRecord, DbErr> {
    let checklist = model
        .checklist
        .map(serde_json::from_value::<Checklist>)
        .transpose()
        .map_err(|e| corrupt("period_close_history.checklist", &e.to_string()))?;
    Ok(CloseRecord {
        id: CloseRecordId::from_uuid(model.id),
        period_id: PeriodId::from_uuid(model.period_id),
        entity_id: EntityId::from_uuid(model.entity_id),
        action: CloseAction::parse(&model.action)
            .ok_or_else(|| corrupt("period_close_history.action", &model.action))?,
        principal: principal("period_close_history.principal", &model.principal)?,
        reason: model.reason,
        forced: model.forced,
        checklist,
        closing_entry_id: model.closing_entry_id.map(JournalEntryId::from_uuid),
        created_at: utc(model.created_at),
    })
}

async fn find_period<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
    period_id: PeriodId,
) -> Result<(accounting_periods::Model, AccountingPeriod), CloseError> {
    let model = accounting_periods::Entity::find_by_id(period_id.into_inner())
        .filter(accounting_periods::Column::EntityId.eq(entity_id.into_inner()))
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(PeriodError::PeriodNotFound(period_id))?;
    let period = period_from_model(model.clone()).map_err(db_err)?;
    Ok((model, period))
}

/// Entries of the entity dated inside the period.
fn entries_in_period(
    period: &AccountingPeriod,
) -> sea_orm::Select<journal_entries::Entity> {
    journal_entries::Entity::find()
        .filter(journal_entries::Column::EntityId.eq(period.entity_id.into_inner()))
        .filter(journal_entries::Column::EntryDate.between(period.start_date, period.end_date))
}

/// Reads everything the checklist needs.
async fn checklist_input<C: ConnectionTrait>(
    conn: &C,
    period: &AccountingPeriod,
) -> Result<(ChecklistInput, Vec<Account>), DbErr> {
    let entity = period.entity_id.into_inner();

    let bank_accounts: Vec<Uuid> = bank_accounts::Entity::find()
        .filter(bank_accounts::Column::EntityId.eq(entity))
        .all(conn)
        .await?
        .into_iter()
        .map(|b| b.id)
        .collect();
    let reports = if bank_accounts.is_empty() {
        Vec::new()
    } else {
        reconciliation_reports::Entity::find()
            .filter(reconciliation_reports::Column::BankAccountId.is_in(bank_accounts.clone()))
            .all(conn)
            .await?
            .into_iter()
            .map(|r| ReportCoverage {
                bank_account_id: BankAccountId::from_uuid(r.bank_account_id),
                period_start: r.period_start,
                period_end: r.period_end,
                is_reconciled: r.is_reconciled,
            })
            .collect()
    };

    let open_entries = entries_in_period(period)
        .filter(journal_entries::Column::Status.is_in(EntryStatus::OPEN.map(|s| s.as_str())))
        .order_by_asc(journal_entries::Column::EntryNumber)
        .all(conn)
        .await?
        .into_iter()
        .map(|e| JournalEntryId::from_uuid(e.id))
        .collect();

    let accounts = entity_accounts(conn, period.entity_id).await?;
    let trial_balance = ReportService::trial_balance(&accounts);
    let depreciation_accounts: Vec<AccountId> = accounts
        .iter()
        .filter(|a| a.allow_posting && a.requires_depreciation)
        .map(|a| a.id)
        .collect();

    let mut adjusted_accounts = HashSet::new();
    if !depreciation_accounts.is_empty() {
        let adjusting: Vec<Uuid> = entries_in_period(period)
            .filter(journal_entries::Column::Status.eq(EntryStatus::Posted.as_str()))
            .filter(journal_entries::Column::SourceType.eq(SourceType::Adjusting.as_str()))
            .all(conn)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        if !adjusting.is_empty() {
            adjusted_accounts = journal_entry_lines::Entity::find()
                .filter(journal_entry_lines::Column::EntryId.is_in(adjusting))
                .all(conn)
                .await?
                .into_iter()
                .map(|l| AccountId::from_uuid(l.account_id))
                .collect();
        }
    }

    let input = ChecklistInput {
        period: period.clone(),
        bank_accounts: bank_accounts.into_iter().map(BankAccountId::from_uuid).collect(),
        reports,
        open_entries,
        trial_balance,
        depreciation_accounts,
        adjusted_accounts,
    };
    Ok((input, accounts))
}

/// Net activity per account from entries that hit balances within the period.
async fn closing_activity<C: ConnectionTrait>(
    conn: &C,
    period: &AccountingPeriod,
    accounts: &[Account],
) -> Result<Vec<ClosingActivity>, DbErr> {
    let entry_ids: Vec<Uuid> = entries_in_period(period)
        .filter(journal_entries::Column::Status.is_in([
            EntryStatus::Posted.as_str(),
            EntryStatus::Reversed.as_str(),
        ]))
        .all(conn)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    if entry_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut totals: BTreeMap<AccountId, (Decimal, Decimal)> = BTreeMap::new();
    for line in journal_entry_lines::Entity::find()
        .filter(journal_entry_lines::Column::EntryId.is_in(entry_ids))
        .all(conn)
        .await?
    {
        let sums = totals
            .entry(AccountId::from_uuid(line.account_id))
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        sums.0 += money(line.debit);
        sums.1 += money(line.credit);
    }

    Ok(accounts
        .iter()
        .filter_map(|a| {
            totals.get(&a.id).map(|(debit, credit)| ClosingActivity {
                account_id: a.id,
                account_type: a.account_type,
                debit: *debit,
                credit: *credit,
            })
        })
        .collect())
}

/// Compare-and-swap of a period's status columns.
async fn update_period<C: ConnectionTrait>(
    conn: &C,
    model: &accounting_periods::Model,
    status: PeriodStatus,
    principal: &Principal,
    reopen_reason: Option<&str>,
) -> Result<(), CloseError> {
    let mut update = accounting_periods::Entity::update_many()
        .col_expr(accounting_periods::Column::Status, Expr::value(status.as_str()))
        .col_expr(accounting_periods::Column::Version, Expr::value(model.version + 1));
    update = match reopen_reason {
        None => update
            .col_expr(accounting_periods::Column::ClosedBy, Expr::value(principal.as_str()))
            .col_expr(accounting_periods::Column::ClosedAt, Expr::value(now()))
            .col_expr(accounting_periods::Column::ReopenReason, Expr::value(None::<String>)),
        Some(reason) => {
            update.col_expr(accounting_periods::Column::ReopenReason, Expr::value(reason))
        }
    };

    let result = update
        .filter(accounting_periods::Column::Id.eq(model.id))
        .filter(accounting_periods::Column::Version.eq(model.version))
        .exec(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected == 0 {
        return Err(PeriodError::ConcurrentModification(PeriodId::from_uuid(model.id)).into());
    }
    Ok(())
}

struct HistoryRow<'a> {
    period: &'a AccountingPeriod,
    action: CloseAction,
    principal: &'a Principal,
    reason: Option<String>,
    forced: bool,
    checklist: Option<&'a Checklist>,
    closing_entry_id: Option<JournalEntryId>,
}

async fn append_history<C: ConnectionTrait>(conn: &C, row: HistoryRow<'_>) -> Result<(), CloseError> {
    let checklist = row
        .checklist
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| CloseError::Database(format!("checklist serialization: {e}")))?;
    period_close_history::ActiveModel {
        id: Set(CloseRecordId::new().into_inner()),
        period_id: Set(row.period.id.into_inner()),
        entity_id: Set(row.period.entity_id.into_inner()),
        action: Set(row.action.as_str().to_string()),
        principal: Set(row.principal.as_str().to_string()),
        reason: Set(row.reason.clone()),
        forced: Set(row.forced),
        checklist: Set(checklist),
        closing_entry_id: Set(row.closing_entry_id.map(JournalEntryId::into_inner)),
        created_at: Set(now()),
    }
    .insert(conn)
    .await
    .map_err(db_err)?;

    audit::append(
        conn,
        AuditEntry {
            subject_kind: SubjectKind::AccountingPeriod,
            subject_id: row.period.id.into_inner(),
            entity_id: row.period.entity_id,
            action: match row.action {
                CloseAction::Closed => AuditAction::Closed,
                CloseAction::Reopened => AuditAction::Reopened,
            },
            principal: row.principal,
            comment: row.reason,
        },
    )
    .await
    .map_err(db_err)
}

/// Period close orchestration repository.
#[derive(Debug, Clone)]
pub struct CloseRepository {
    db: DatabaseConnection,
}

impl CloseRepository {
    /// Creates a new close repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Evaluates the close checklist for a period without changing anything.
    ///
    /// # Errors
    ///
    /// Returns `Period(PeriodNotFound)` if the period is not the entity's.
    pub async fn evaluate_checklist(
        &self,
        entity_id: EntityId,
        period_id: PeriodId,
    ) -> Result<Checklist, CloseError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let (_, period) = find_period(&txn, entity_id, period_id).await?;
        let (input, _) = checklist_input(&txn, &period).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(CloseService::evaluate(&input))
    }

    /// Closes a period.
    ///
    /// Re-runs the checklist. With every item passing, or with
    /// `options.force`, it posts the optional closing entry, locks the period
    /// range, marks the period closed and appends a history row.
    ///
    /// # Errors
    ///
    /// Returns `ChecklistIncomplete` when items fail without `force`,
    /// `InvalidRetainedEarnings`, `Period(InvalidStatus)` for a closed period,
    /// `Period(OverlappingLock)`, or `Period(ConcurrentModification)`.
    pub async fn close(
        &self,
        entity_id: EntityId,
        period_id: PeriodId,
        principal: &Principal,
        options: CloseOptions,
    ) -> Result<CloseOutcome, CloseError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        lock_periods_in(&txn, entity_id, None).await.map_err(db_err)?;
        let (model, period) = find_period(&txn, entity_id, period_id).await?;
        PeriodService::validate_can_close(&period)?;

        let (input, accounts) = checklist_input(&txn, &period).await.map_err(db_err)?;
        let checklist = CloseService::evaluate(&input);
        if !checklist.is_complete() {
            let failures = checklist.failures();
            if !options.force {
                warn!(
                    period_id = %period_id,
                    failing = failures.len(),
                    "Period close refused: checklist incomplete"
                );
                return Err(CloseError::ChecklistIncomplete {
                    period_id,
                    failures,
                });
            }
            warn!(
                period_id = %period_id,
                principal = %principal,
                failing = failures.len(),
                "Forcing period close with incomplete checklist"
            );
        }

        let mut closing_entry_id = None;
        if let Some(retained) = options.retained_earnings {
            CloseService::validate_retained_earnings(
                entity_id,
                retained,
                accounts.iter().find(|a| a.id == retained),
            )?;
            let activity = closing_activity(&txn, &period, &accounts)
                .await
                .map_err(db_err)?;
            if let Some(new) = CloseService::closing_entry(
                entity_id,
                &period,
                &activity,
                retained,
                principal.clone(),
            ) {
                closing_entry_id = Some(insert_posted_entry(&txn, &new, None).await?);
            }
        }

        let lock = create_lock_in(
            &txn,
            entity_id,
            period.range(),
            Some(period_id),
            &format!("Period {} closed", period.name),
            principal,
        )
        .await?;
        update_period(&txn, &model, PeriodStatus::Closed, principal, None).await?;
        let forced = !checklist.is_complete();
        append_history(
            &txn,
            HistoryRow {
                period: &period,
                action: CloseAction::Closed,
                principal,
                reason: forced.then(|| "forced close".to_string()),
                forced,
                checklist: Some(&checklist),
                closing_entry_id,
            },
        )
        .await?;

        let updated = accounting_periods::Entity::find_by_id(model.id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(PeriodError::PeriodNotFound(period_id))?;
        let period = period_from_model(updated).map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        info!(
            period_id = %period_id,
            entity_id = %entity_id,
            principal = %principal,
            forced,
            lock_id = %lock.id,
            closing_entry_id = ?closing_entry_id,
            "Period closed"
        );
        Ok(CloseOutcome {
            period,
            checklist,
            lock_id: lock.id,
            closing_entry_id,
            forced,
        })
    }

    /// Reopens a closed period, releasing its lock.
    ///
    /// # Errors
    ///
    /// Returns `Period(ReasonRequired)`, `Period(InvalidStatus)` unless the
    /// period is closed, or `Period(ConcurrentModification)`.
    pub async fn reopen(
        &self,
        entity_id: EntityId,
        period_id: PeriodId,
        principal: &Principal,
        reason: &str,
    ) -> Result<AccountingPeriod, CloseError> {
        let reason = PeriodService::require_reason(reason, "reopen a period")?;

        let txn = self.db.begin().await.map_err(db_err)?;
        lock_periods_in(&txn, entity_id, None).await.map_err(db_err)?;
        let (model, period) = find_period(&txn, entity_id, period_id).await?;
        PeriodService::validate_can_reopen(&period)?;

        let mut released = 0;
        for lock in period_locks_in(&txn, period_id).await.map_err(db_err)? {
            if deactivate_lock_in(&txn, &lock, principal, &reason)
                .await
                .map_err(db_err)?
            {
                released += 1;
            }
        }
        update_period(&txn, &model, PeriodStatus::Reopened, principal, Some(&reason)).await?;
        append_history(
            &txn,
            HistoryRow {
                period: &period,
                action: CloseAction::Reopened,
                principal,
                reason: Some(reason.clone()),
                forced: false,
                checklist: None,
                closing_entry_id: None,
            },
        )
        .await?;

        let updated = accounting_periods::Entity::find_by_id(model.id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(PeriodError::PeriodNotFound(period_id))?;
        let period = period_from_model(updated).map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        info!(
            period_id = %period_id,
            entity_id = %entity_id,
            principal = %principal,
            released_locks = released,
            reason = %reason,
            "Period reopened"
        );
        Ok(period)
    }

    /// Every close and reopen of a period, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn close_history(&self, period_id: PeriodId) -> Result<Vec<CloseRecord>, CloseError> {
        let models = period_close_history::Entity::find()
            .filter(period_close_history::Column::PeriodId.eq(period_id.into_inner()))
            .order_by_asc(period_close_history::Column::CreatedAt)
            .order_by_asc(period_close_history::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models
            .into_iter()
            .map(|m| record_from_model(m).map_err(db_err))
            .collect()
    }
}
