//! `SeaORM` Entity for reconciliation_reports table.
//!
//! Reports are immutable snapshots: inserted once, never updated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciliation_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bank_account_id: Uuid,
    pub period_start: Date,
    pub period_end: Date,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub statement_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub gl_balance: Decimal,
    pub outstanding_deposits: Json,
    pub outstanding_checks: Json,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub outstanding_deposits_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub outstanding_checks_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub adjusted_bank_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub difference: Decimal,
    pub is_reconciled: bool,
    pub prepared_by: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bank_accounts::Entity",
        from = "Column::BankAccountId",
        to = "super::bank_accounts::Column::Id"
    )]
    BankAccounts,
}

impl Related<super::bank_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
