//! `SeaORM` Entity for accounting_periods table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounting_periods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_id: Uuid,
    pub name: String,
    pub period_type: String,
    pub start_date: Date,
    pub end_date: Date,
    pub status: String,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTimeWithTimeZone>,
    pub reopen_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_entries::Entity")]
    JournalEntries,
    #[sea_orm(has_many = "super::period_close_history::Entity")]
    PeriodCloseHistory,
}

impl Related<super::journal_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalEntries.def()
    }
}

impl Related<super::period_close_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PeriodCloseHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
