//! `SeaORM` Entity for period_locks table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "period_locks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_id: Uuid,
    pub period_id: Option<Uuid>,
    pub start_date: Date,
    pub end_date: Date,
    pub reason: String,
    pub locked_by: String,
    pub locked_at: DateTimeWithTimeZone,
    pub is_active: bool,
    pub unlocked_by: Option<String>,
    pub unlocked_at: Option<DateTimeWithTimeZone>,
    pub unlock_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
