//! Ledger core schema.
//!
//! Tables are generated from the entity definitions so the schema matches on
//! `PostgreSQL` and `SQLite`. The uniqueness rules the repositories rely on
//! live in the indexes below.

use sea_orm::{EntityName, EntityTrait, Schema};
use sea_orm_migration::prelude::*;

use crate::entities::{
    accounting_periods, accounts, audit_log, bank_accounts, bank_transactions, journal_entries,
    journal_entry_lines, period_close_history, period_locks, reconciliation_reports,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        // Parents before children so foreign keys resolve.
        create(manager, &schema, accounts::Entity).await?;
        create(manager, &schema, accounting_periods::Entity).await?;
        create(manager, &schema, journal_entries::Entity).await?;
        create(manager, &schema, journal_entry_lines::Entity).await?;
        create(manager, &schema, audit_log::Entity).await?;
        create(manager, &schema, period_locks::Entity).await?;
        create(manager, &schema, period_close_history::Entity).await?;
        create(manager, &schema, bank_accounts::Entity).await?;
        create(manager, &schema, bank_transactions::Entity).await?;
        create(manager, &schema, reconciliation_reports::Entity).await?;

        for index in indexes() {
            manager.create_index(index).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            reconciliation_reports::Entity.table_ref(),
            bank_transactions::Entity.table_ref(),
            bank_accounts::Entity.table_ref(),
            period_close_history::Entity.table_ref(),
            period_locks::Entity.table_ref(),
            audit_log::Entity.table_ref(),
            journal_entry_lines::Entity.table_ref(),
            journal_entries::Entity.table_ref(),
            accounting_periods::Entity.table_ref(),
            accounts::Entity.table_ref(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

async fn create<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    manager
        .create_table(schema.create_table_from_entity(entity).if_not_exists().to_owned())
        .await
}

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        // Account numbers are unique per entity
        Index::create()
            .name("idx_accounts_entity_number")
            .table(accounts::Entity)
            .col(accounts::Column::EntityId)
            .col(accounts::Column::Number)
            .unique()
            .to_owned(),
        // Entry numbers are unique per entity; a numbering race surfaces here
        Index::create()
            .name("idx_journal_entries_entity_number")
            .table(journal_entries::Entity)
            .col(journal_entries::Column::EntityId)
            .col(journal_entries::Column::EntryNumber)
            .unique()
            .to_owned(),
        Index::create()
            .name("idx_journal_entries_entity_date")
            .table(journal_entries::Entity)
            .col(journal_entries::Column::EntityId)
            .col(journal_entries::Column::EntryDate)
            .to_owned(),
        // An entry is reversed at most once
        Index::create()
            .name("idx_journal_entries_reverses")
            .table(journal_entries::Entity)
            .col(journal_entries::Column::ReversesEntryId)
            .unique()
            .to_owned(),
        Index::create()
            .name("idx_journal_entry_lines_entry")
            .table(journal_entry_lines::Entity)
            .col(journal_entry_lines::Column::EntryId)
            .col(journal_entry_lines::Column::LineNumber)
            .unique()
            .to_owned(),
        Index::create()
            .name("idx_journal_entry_lines_account")
            .table(journal_entry_lines::Entity)
            .col(journal_entry_lines::Column::AccountId)
            .to_owned(),
        Index::create()
            .name("idx_audit_log_subject")
            .table(audit_log::Entity)
            .col(audit_log::Column::SubjectId)
            .col(audit_log::Column::CreatedAt)
            .to_owned(),
        Index::create()
            .name("idx_accounting_periods_entity_dates")
            .table(accounting_periods::Entity)
            .col(accounting_periods::Column::EntityId)
            .col(accounting_periods::Column::StartDate)
            .unique()
            .to_owned(),
        Index::create()
            .name("idx_period_locks_entity_active")
            .table(period_locks::Entity)
            .col(period_locks::Column::EntityId)
            .col(period_locks::Column::IsActive)
            .to_owned(),
        Index::create()
            .name("idx_period_close_history_period")
            .table(period_close_history::Entity)
            .col(period_close_history::Column::PeriodId)
            .col(period_close_history::Column::CreatedAt)
            .to_owned(),
        // Ingest idempotency key
        Index::create()
            .name("idx_bank_transactions_external")
            .table(bank_transactions::Entity)
            .col(bank_transactions::Column::BankAccountId)
            .col(bank_transactions::Column::ExternalId)
            .unique()
            .to_owned(),
        // At most one bank transaction per entry
        Index::create()
            .name("idx_bank_transactions_matched_entry")
            .table(bank_transactions::Entity)
            .col(bank_transactions::Column::MatchedEntryId)
            .unique()
            .to_owned(),
        Index::create()
            .name("idx_reconciliation_reports_account_end")
            .table(reconciliation_reports::Entity)
            .col(reconciliation_reports::Column::BankAccountId)
            .col(reconciliation_reports::Column::PeriodEnd)
            .to_owned(),
    ]
}
