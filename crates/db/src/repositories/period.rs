//! Period repository: accounting periods and period locks.

use chrono::NaiveDate;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use tally_core::audit::{AuditAction, SubjectKind};
use tally_core::period::{
    AccountingPeriod, DateRange, NewPeriod, PeriodError, PeriodLock, PeriodService, PeriodStatus,
    PeriodType,
};
use tally_shared::types::{EntityId, PeriodId, PeriodLockId, Principal};

use super::audit::{self, AuditEntry};
use super::{corrupt, now, optional_principal, principal, utc};
use crate::entities::{accounting_periods, period_locks};

fn db_err(err: DbErr) -> PeriodError {
    PeriodError::Database(err.to_string())
}

pub(crate) fn period_from_model(model: accounting_periods::Model) -> Result<AccountingPeriod, DbErr> {
    Ok(AccountingPeriod {
        id: PeriodId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        period_type: PeriodType::parse(&model.period_type)
            .ok_or_else(|| corrupt("accounting_periods.period_type", &model.period_type))?,
        status: PeriodStatus::parse(&model.status)
            .ok_or_else(|| corrupt("accounting_periods.status", &model.status))?,
        closed_by: optional_principal("accounting_periods.closed_by", model.closed_by.as_deref())?,
        closed_at: model.closed_at.map(utc),
        name: model.name,
        start_date: model.start_date,
        end_date: model.end_date,
        reopen_reason: model.reopen_reason,
        version: model.version,
    })
}

pub(crate) fn lock_from_model(model: period_locks::Model) -> Result<PeriodLock, DbErr> {
    Ok(PeriodLock {
        id: PeriodLockId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        period_id: model.period_id.map(PeriodId::from_uuid),
        locked_by: principal("period_locks.locked_by", &model.locked_by)?,
        unlocked_by: optional_principal("period_locks.unlocked_by", model.unlocked_by.as_deref())?,
        locked_at: utc(model.locked_at),
        unlocked_at: model.unlocked_at.map(utc),
        start_date: model.start_date,
        end_date: model.end_date,
        reason: model.reason,
        is_active: model.is_active,
        unlock_reason: model.unlock_reason,
    })
}

/// Whether no active lock of the entity covers `date`.
pub(crate) async fn is_postable_in<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
    date: NaiveDate,
) -> Result<bool, DbErr> {
    let locks: Vec<DateRange> = active_locks(conn, entity_id)
        .await?
        .iter()
        .map(|l| DateRange {
            start: l.start_date,
            end: l.end_date,
        })
        .collect();
    Ok(PeriodService::is_postable(&locks, date))
}

/// The entity's period containing `date`.
pub(crate) async fn period_for_date_in<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
    date: NaiveDate,
) -> Result<Option<accounting_periods::Model>, DbErr> {
    accounting_periods::Entity::find()
        .filter(accounting_periods::Column::EntityId.eq(entity_id.into_inner()))
        .filter(accounting_periods::Column::StartDate.lte(date))
        .filter(accounting_periods::Column::EndDate.gte(date))
        .one(conn)
        .await
}

/// Takes row locks on the entity's periods overlapping `range`, or on all of
/// them when `range` is `None`.
///
/// Lock creation, closing and posting all go through here first, so on
/// Postgres they serialize per entity. Rows are locked in start-date order.
/// SQLite has no row locks and relies on its single writer instead.
pub(crate) async fn lock_periods_in<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
    range: Option<DateRange>,
) -> Result<Vec<accounting_periods::Model>, DbErr> {
    let mut query = accounting_periods::Entity::find()
        .filter(accounting_periods::Column::EntityId.eq(entity_id.into_inner()));
    if let Some(range) = range {
        query = query
            .filter(accounting_periods::Column::StartDate.lte(range.end))
            .filter(accounting_periods::Column::EndDate.gte(range.start));
    }
    query
        .order_by_asc(accounting_periods::Column::StartDate)
        .lock_exclusive()
        .all(conn)
        .await
}

async fn active_locks<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
) -> Result<Vec<period_locks::Model>, DbErr> {
    period_locks::Entity::find()
        .filter(period_locks::Column::EntityId.eq(entity_id.into_inner()))
        .filter(period_locks::Column::IsActive.eq(true))
        .order_by_asc(period_locks::Column::StartDate)
        .all(conn)
        .await
}

/// Creates an active lock, refusing overlaps with other active locks.
///
/// When closing a period, an active lock over exactly the same range is
/// adopted by the period instead.
pub(crate) async fn create_lock_in<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
    range: DateRange,
    period_id: Option<PeriodId>,
    reason: &str,
    locked_by: &Principal,
) -> Result<PeriodLock, PeriodError> {
    lock_periods_in(conn, entity_id, None).await.map_err(db_err)?;
    let existing = active_locks(conn, entity_id).await.map_err(db_err)?;

    if let Some(period_id) = period_id
        && let Some(same) = existing
            .iter()
            .find(|l| l.start_date == range.start && l.end_date == range.end)
    {
        let mut active: period_locks::ActiveModel = same.clone().into();
        active.period_id = Set(Some(period_id.into_inner()));
        let adopted = active.update(conn).await.map_err(db_err)?;
        return lock_from_model(adopted).map_err(db_err);
    }

    let overlap = PeriodService::find_overlap(
        existing.iter().map(|l| {
            (
                PeriodLockId::from_uuid(l.id),
                DateRange {
                    start: l.start_date,
                    end: l.end_date,
                },
            )
        }),
        &range,
    );
    if let Some(existing) = overlap {
        return Err(PeriodError::OverlappingLock {
            entity_id,
            start: range.start,
            end: range.end,
            existing,
        });
    }

    let id = PeriodLockId::new();
    let model = period_locks::ActiveModel {
        id: Set(id.into_inner()),
        entity_id: Set(entity_id.into_inner()),
        period_id: Set(period_id.map(PeriodId::into_inner)),
        start_date: Set(range.start),
        end_date: Set(range.end),
        reason: Set(reason.to_string()),
        locked_by: Set(locked_by.as_str().to_string()),
        locked_at: Set(now()),
        is_active: Set(true),
        unlocked_by: Set(None),
        unlocked_at: Set(None),
        unlock_reason: Set(None),
    }
    .insert(conn)
    .await
    .map_err(db_err)?;

    audit::append(
        conn,
        AuditEntry {
            subject_kind: SubjectKind::PeriodLock,
            subject_id: id.into_inner(),
            entity_id,
            action: AuditAction::Locked,
            principal: locked_by,
            comment: Some(reason.to_string()),
        },
    )
    .await
    .map_err(db_err)?;

    lock_from_model(model).map_err(db_err)
}

/// Deactivates one lock and audits it. Returns false if it was no longer active.
pub(crate) async fn deactivate_lock_in<C: ConnectionTrait>(
    conn: &C,
    lock: &period_locks::Model,
    unlocked_by: &Principal,
    reason: &str,
) -> Result<bool, DbErr> {
    let result = period_locks::Entity::update_many()
        .col_expr(period_locks::Column::IsActive, Expr::value(false))
        .col_expr(
            period_locks::Column::UnlockedBy,
            Expr::value(unlocked_by.as_str()),
        )
        .col_expr(period_locks::Column::UnlockedAt, Expr::value(now()))
        .col_expr(period_locks::Column::UnlockReason, Expr::value(reason))
        .filter(period_locks::Column::Id.eq(lock.id))
        .filter(period_locks::Column::IsActive.eq(true))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Ok(false);
    }

    audit::append(
        conn,
        AuditEntry {
            subject_kind: SubjectKind::PeriodLock,
            subject_id: lock.id,
            entity_id: EntityId::from_uuid(lock.entity_id),
            action: AuditAction::Unlocked,
            principal: unlocked_by,
            comment: Some(reason.to_string()),
        },
    )
    .await?;
    Ok(true)
}

/// Active locks created by closing a period.
pub(crate) async fn period_locks_in<C: ConnectionTrait>(
    conn: &C,
    period_id: PeriodId,
) -> Result<Vec<period_locks::Model>, DbErr> {
    period_locks::Entity::find()
        .filter(period_locks::Column::PeriodId.eq(period_id.into_inner()))
        .filter(period_locks::Column::IsActive.eq(true))
        .all(conn)
        .await
}

/// Accounting period and period lock repository.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    db: DatabaseConnection,
}

impl PeriodRepository {
    /// Creates a new period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an accounting period.
    ///
    /// # Errors
    ///
    /// Returns `OverlappingPeriod` if it intersects another period of the
    /// entity.
    pub async fn create_period(&self, new: NewPeriod) -> Result<AccountingPeriod, PeriodError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let period = insert_period(&txn, &new).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            entity_id = %new.entity_id,
            period_id = %period.id,
            range = %new.range,
            "Accounting period created"
        );
        Ok(period)
    }

    /// Creates the twelve calendar months of `year` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `OverlappingPeriod` if any month intersects an existing period.
    pub async fn create_monthly_periods(
        &self,
        entity_id: EntityId,
        year: i32,
    ) -> Result<Vec<AccountingPeriod>, PeriodError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let mut periods = Vec::with_capacity(12);
        for new in PeriodService::monthly_periods(entity_id, year) {
            periods.push(insert_period(&txn, &new).await?);
        }
        txn.commit().await.map_err(db_err)?;

        info!(entity_id = %entity_id, year, "Monthly periods created");
        Ok(periods)
    }

    /// Gets a period by ID.
    ///
    /// # Errors
    ///
    /// Returns `PeriodNotFound` if it does not exist.
    pub async fn get_period(&self, period_id: PeriodId) -> Result<AccountingPeriod, PeriodError> {
        let model = accounting_periods::Entity::find_by_id(period_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(PeriodError::PeriodNotFound(period_id))?;
        period_from_model(model).map_err(db_err)
    }

    /// Lists an entity's periods by start date.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_periods(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<AccountingPeriod>, PeriodError> {
        accounting_periods::Entity::find()
            .filter(accounting_periods::Column::EntityId.eq(entity_id.into_inner()))
            .order_by_asc(accounting_periods::Column::StartDate)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|m| period_from_model(m).map_err(db_err))
            .collect()
    }

    /// The period containing `date`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn period_for_date(
        &self,
        entity_id: EntityId,
        date: NaiveDate,
    ) -> Result<Option<AccountingPeriod>, PeriodError> {
        period_for_date_in(&self.db, entity_id, date)
            .await
            .map_err(db_err)?
            .map(|m| period_from_model(m).map_err(db_err))
            .transpose()
    }

    /// Whether entries may be posted on `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn is_postable(&self, entity_id: EntityId, date: NaiveDate) -> Result<bool, PeriodError> {
        is_postable_in(&self.db, entity_id, date).await.map_err(db_err)
    }

    /// Locks a date range.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `InvalidDateRange` or `OverlappingLock`.
    pub async fn lock(
        &self,
        entity_id: EntityId,
        start: NaiveDate,
        end: NaiveDate,
        reason: &str,
        locked_by: &Principal,
    ) -> Result<PeriodLock, PeriodError> {
        let reason = PeriodService::require_reason(reason, "lock a period")?;
        let range = DateRange::new(start, end)?;

        let txn = self.db.begin().await.map_err(db_err)?;
        let lock = create_lock_in(&txn, entity_id, range, None, &reason, locked_by).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            entity_id = %entity_id,
            lock_id = %lock.id,
            range = %range,
            principal = %locked_by,
            "Period locked"
        );
        Ok(lock)
    }

    /// Unlocks the active lock covering exactly `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired` or `LockNotFound`.
    pub async fn unlock(
        &self,
        entity_id: EntityId,
        start: NaiveDate,
        end: NaiveDate,
        unlocked_by: &Principal,
        reason: &str,
    ) -> Result<PeriodLock, PeriodError> {
        let reason = PeriodService::require_reason(reason, "unlock a period")?;
        let not_found = || PeriodError::LockNotFound {
            entity_id,
            start,
            end,
        };

        let txn = self.db.begin().await.map_err(db_err)?;
        lock_periods_in(&txn, entity_id, None).await.map_err(db_err)?;
        let lock = active_locks(&txn, entity_id)
            .await
            .map_err(db_err)?
            .into_iter()
            .find(|l| l.start_date == start && l.end_date == end)
            .ok_or_else(not_found)?;
        if !deactivate_lock_in(&txn, &lock, unlocked_by, &reason)
            .await
            .map_err(db_err)?
        {
            return Err(not_found());
        }
        let updated = period_locks::Entity::find_by_id(lock.id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(not_found)?;
        txn.commit().await.map_err(db_err)?;

        info!(
            entity_id = %entity_id,
            lock_id = %lock.id,
            principal = %unlocked_by,
            reason = %reason,
            "Period unlocked"
        );
        lock_from_model(updated).map_err(db_err)
    }

    /// Lists an entity's locks, active and inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_locks(&self, entity_id: EntityId) -> Result<Vec<PeriodLock>, PeriodError> {
        period_locks::Entity::find()
            .filter(period_locks::Column::EntityId.eq(entity_id.into_inner()))
            .order_by_asc(period_locks::Column::StartDate)
            .order_by_asc(period_locks::Column::LockedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|m| lock_from_model(m).map_err(db_err))
            .collect()
    }
}

async fn insert_period<C: ConnectionTrait>(
    conn: &C,
    new: &NewPeriod,
) -> Result<AccountingPeriod, PeriodError> {
    let range = DateRange::new(new.range.start, new.range.end)?;
    let existing = lock_periods_in(conn, new.entity_id, None)
        .await
        .map_err(db_err)?;
    let overlap = PeriodService::find_overlap(
        existing.iter().map(|p| {
            (
                PeriodId::from_uuid(p.id),
                DateRange {
                    start: p.start_date,
                    end: p.end_date,
                },
            )
        }),
        &range,
    );
    if let Some(existing) = overlap {
        return Err(PeriodError::OverlappingPeriod {
            entity_id: new.entity_id,
            start: range.start,
            end: range.end,
            existing,
        });
    }

    let model = accounting_periods::ActiveModel {
        id: Set(PeriodId::new().into_inner()),
        entity_id: Set(new.entity_id.into_inner()),
        name: Set(new.name.clone()),
        period_type: Set(new.period_type.as_str().to_string()),
        start_date: Set(range.start),
        end_date: Set(range.end),
        status: Set(PeriodStatus::Open.as_str().to_string()),
        closed_by: Set(None),
        closed_at: Set(None),
        reopen_reason: Set(None),
        version: Set(0),
        created_at: Set(now()),
    }
    .insert(conn)
    .await
    .map_err(db_err)?;
    period_from_model(model).map_err(db_err)
}
