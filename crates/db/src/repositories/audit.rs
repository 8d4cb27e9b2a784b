//! Append-only audit log.
//!
//! Rows are written by the other repositories inside the transaction of the
//! state change they describe. No update or delete exists.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use tally_core::audit::{AuditAction, AuditRecord, SubjectKind};
use tally_shared::types::{AuditLogId, EntityId, Principal};
use uuid::Uuid;

use super::{corrupt, now, principal, utc};
use crate::entities::audit_log;

/// Fields of a new audit row.
#[derive(Debug, Clone)]
pub(crate) struct AuditEntry<'a> {
    pub subject_kind: SubjectKind,
    pub subject_id: Uuid,
    pub entity_id: EntityId,
    pub action: AuditAction,
    pub principal: &'a Principal,
    pub comment: Option<String>,
}

/// Appends one audit row.
pub(crate) async fn append<C: ConnectionTrait>(
    conn: &C,
    entry: AuditEntry<'_>,
) -> Result<(), DbErr> {
    audit_log::ActiveModel {
        id: Set(AuditLogId::new().into_inner()),
        subject_kind: Set(entry.subject_kind.as_str().to_string()),
        subject_id: Set(entry.subject_id),
        entity_id: Set(entry.entity_id.into_inner()),
        action: Set(entry.action.as_str().to_string()),
        principal: Set(entry.principal.as_str().to_string()),
        comment: Set(entry.comment),
        created_at: Set(now()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Audit rows of one subject in the order they were written.
pub(crate) async fn trail<C: ConnectionTrait>(
    conn: &C,
    subject_id: Uuid,
) -> Result<Vec<AuditRecord>, DbErr> {
    // v7 ids are time ordered, which breaks ties between rows of one transaction
    audit_log::Entity::find()
        .filter(audit_log::Column::SubjectId.eq(subject_id))
        .order_by_asc(audit_log::Column::CreatedAt)
        .order_by_asc(audit_log::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(record_from_model)
        .collect()
}

fn record_from_model(model: audit_log::Model) -> Result<AuditRecord, DbErr> {
    Ok(AuditRecord {
        id: AuditLogId::from_uuid(model.id),
        subject_kind: SubjectKind::parse(&model.subject_kind)
            .ok_or_else(|| corrupt("audit_log.subject_kind", &model.subject_kind))?,
        subject_id: model.subject_id,
        entity_id: EntityId::from_uuid(model.entity_id),
        action: AuditAction::parse(&model.action)
            .ok_or_else(|| corrupt("audit_log.action", &model.action))?,
        principal: principal("audit_log.principal", &model.principal)?,
        comment: model.comment,
        created_at: utc(model.created_at),
    })
}

/// Read access to the audit log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    db: DatabaseConnection,
}

impl AuditRepository {
    /// Creates a new audit repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Audit trail of an entry, lock or period.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn trail(&self, subject_id: Uuid) -> Result<Vec<AuditRecord>, DbErr> {
        trail(&self.db, subject_id).await
    }

    /// Every audit row of an entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn for_entity(&self, entity_id: EntityId) -> Result<Vec<AuditRecord>, DbErr> {
        audit_log::Entity::find()
            .filter(audit_log::Column::EntityId.eq(entity_id.into_inner()))
            .order_by_asc(audit_log::Column::CreatedAt)
            .order_by_asc(audit_log::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(record_from_model)
            .collect()
    }
}
