//! Account repository for chart of accounts database operations.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::info;

use tally_core::accounts::{Account, AccountBalance, AccountType, NewAccount, NormalBalance};
use tally_core::ledger::LedgerError;
use tally_core::reports::{ReportService, TrialBalance};
use tally_core::workflow::EntryStatus;
use tally_shared::types::{AccountId, EntityId};

use super::{corrupt, is_unique_violation, money, now};
use crate::entities::{accounts, journal_entries, journal_entry_lines};

fn db_err(err: DbErr) -> LedgerError {
    LedgerError::Database(err.to_string())
}

pub(crate) fn account_from_model(model: accounts::Model) -> Result<Account, DbErr> {
    Ok(Account {
        id: AccountId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        account_type: AccountType::parse(&model.account_type)
            .ok_or_else(|| corrupt("accounts.account_type", &model.account_type))?,
        normal_balance: NormalBalance::parse(&model.normal_balance)
            .ok_or_else(|| corrupt("accounts.normal_balance", &model.normal_balance))?,
        number: model.number,
        name: model.name,
        allow_posting: model.allow_posting,
        requires_depreciation: model.requires_depreciation,
        current_balance: money(model.current_balance),
        version: model.version,
    })
}

/// All accounts of an entity ordered by number.
pub(crate) async fn entity_accounts<C: ConnectionTrait>(
    conn: &C,
    entity_id: EntityId,
) -> Result<Vec<Account>, DbErr> {
    accounts::Entity::find()
        .filter(accounts::Column::EntityId.eq(entity_id.into_inner()))
        .order_by_asc(accounts::Column::Number)
        .all(conn)
        .await?
        .into_iter()
        .map(account_from_model)
        .collect()
}

/// Chart of accounts repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Registers an account. The normal balance follows from the type.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAccountNumber` if the number is taken in the entity.
    pub async fn create_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let duplicate = || LedgerError::DuplicateAccountNumber {
            entity_id: new.entity_id,
            number: new.number.clone(),
        };

        let taken = accounts::Entity::find()
            .filter(accounts::Column::EntityId.eq(new.entity_id.into_inner()))
            .filter(accounts::Column::Number.eq(new.number.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if taken.is_some() {
            return Err(duplicate());
        }

        let ts = now();
        let model = accounts::ActiveModel {
            id: Set(AccountId::new().into_inner()),
            entity_id: Set(new.entity_id.into_inner()),
            number: Set(new.number.clone()),
            name: Set(new.name.clone()),
            account_type: Set(new.account_type.as_str().to_string()),
            normal_balance: Set(new.account_type.normal_balance().as_str().to_string()),
            allow_posting: Set(new.allow_posting),
            requires_depreciation: Set(new.requires_depreciation),
            current_balance: Set(Decimal::ZERO),
            version: Set(0),
            created_at: Set(ts),
            updated_at: Set(ts),
        }
        .insert(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate()
            } else {
                db_err(e)
            }
        })?;

        let account = account_from_model(model).map_err(db_err)?;
        info!(
            entity_id = %account.entity_id,
            account_id = %account.id,
            number = %account.number,
            account_type = %account.account_type,
            "Account created"
        );
        Ok(account)
    }

    /// Gets an account by ID.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if it does not exist.
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        let model = accounts::Entity::find_by_id(account_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        account_from_model(model).map_err(db_err)
    }

    /// Lists an entity's accounts ordered by number.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_accounts(&self, entity_id: EntityId) -> Result<Vec<Account>, LedgerError> {
        entity_accounts(&self.db, entity_id).await.map_err(db_err)
    }

    /// Running balance with debit and credit totals of posted lines.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError> {
        let account = self.get_account(account_id).await?;

        let posted_entry_ids: Vec<uuid::Uuid> = journal_entries::Entity::find()
            .filter(journal_entries::Column::EntityId.eq(account.entity_id.into_inner()))
            .filter(journal_entries::Column::Status.is_in([
                EntryStatus::Posted.as_str(),
                EntryStatus::Reversed.as_str(),
            ]))
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|e| e.id)
            .collect();

        let lines = journal_entry_lines::Entity::find()
            .filter(journal_entry_lines::Column::AccountId.eq(account_id.into_inner()))
            .filter(journal_entry_lines::Column::EntryId.is_in(posted_entry_ids))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut balance = AccountBalance::new(account_id, account.normal_balance);
        for line in lines {
            balance.apply(money(line.debit), money(line.credit));
        }
        balance.balance = account.current_balance;
        Ok(balance)
    }

    /// Trial balance of an entity's posting accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn trial_balance(&self, entity_id: EntityId) -> Result<TrialBalance, LedgerError> {
        let accounts = entity_accounts(&self.db, entity_id).await.map_err(db_err)?;
        Ok(ReportService::trial_balance(&accounts))
    }
}
