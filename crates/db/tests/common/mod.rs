//! Shared fixtures for repository integration tests.
//!
//! Every test gets its own in-memory `SQLite` database with the full schema,
//! one entity, a small chart of accounts and the twelve months of 2024.

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

use tally_core::accounts::{AccountType, NewAccount};
use tally_core::ledger::{JournalEntry, LineInput, NewEntry};
use tally_core::period::AccountingPeriod;
use tally_core::workflow::AuthorizationPolicy;
use tally_db::migration::{Migrator, MigratorTrait};
use tally_db::{AccountRepository, LedgerRepository, PeriodRepository};
use tally_shared::config::DatabaseConfig;
use tally_shared::types::{AccountId, EntityId, Principal};

pub struct Fixture {
    pub db: DatabaseConnection,
    pub entity_id: EntityId,
    pub cash: AccountId,
    pub payables: AccountId,
    pub retained_earnings: AccountId,
    pub revenue: AccountId,
    pub expenses: AccountId,
    pub assets_header: AccountId,
    pub periods: Vec<AccountingPeriod>,
}

impl Fixture {
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.db.clone(), policy())
    }

    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.db.clone())
    }

    pub fn periods(&self) -> PeriodRepository {
        PeriodRepository::new(self.db.clone())
    }

    /// The accounting period for `month` of 2024.
    pub fn month(&self, month: usize) -> &AccountingPeriod {
        &self.periods[month - 1]
    }

    pub fn entry(&self, date: NaiveDate, memo: &str, lines: Vec<LineInput>) -> NewEntry {
        NewEntry::manual(self.entity_id, date, memo, lines, p("alice@example.com"))
    }

    /// Creates an entry as alice and takes it through both approvals.
    pub async fn post(&self, new: NewEntry) -> JournalEntry {
        let ledger = self.ledger();
        let entry = ledger.create_entry(new).await.expect("create entry");
        ledger
            .submit(entry.id, p("alice@example.com"))
            .await
            .expect("submit entry");
        ledger
            .approve(entry.id, p("bob@example.com"))
            .await
            .expect("first approval");
        ledger
            .approve(entry.id, p("carol@example.com"))
            .await
            .expect("final approval")
    }

    /// Posts `amount` as debit `debit` / credit `credit`.
    pub async fn post_simple(
        &self,
        date: NaiveDate,
        memo: &str,
        debit: AccountId,
        credit: AccountId,
        amount: Decimal,
    ) -> JournalEntry {
        self.post(self.entry(
            date,
            memo,
            vec![
                LineInput::debit(debit, amount),
                LineInput::credit(credit, amount),
            ],
        ))
        .await
    }

    pub async fn balance(&self, account_id: AccountId) -> Decimal {
        self.accounts()
            .get_account(account_id)
            .await
            .expect("account exists")
            .current_balance
    }
}

pub fn p(raw: &str) -> Principal {
    Principal::new(raw).expect("valid principal")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Dual approval by bob, carol or dave; alice only creates entries.
pub fn policy() -> AuthorizationPolicy {
    AuthorizationPolicy::dual([
        p("bob@example.com"),
        p("carol@example.com"),
        p("dave@example.com"),
    ])
}

pub async fn connect() -> DatabaseConnection {
    let db = tally_db::connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
    })
    .await
    .expect("Failed to open in-memory database");
    Migrator::up(&db, None).await.expect("Failed to migrate");
    db
}

pub async fn account(
    repo: &AccountRepository,
    entity_id: EntityId,
    number: &str,
    name: &str,
    account_type: AccountType,
    allow_posting: bool,
) -> AccountId {
    repo.create_account(NewAccount {
        entity_id,
        number: number.to_string(),
        name: name.to_string(),
        account_type,
        allow_posting,
        requires_depreciation: false,
    })
    .await
    .expect("create account")
    .id
}

pub async fn setup() -> Fixture {
    let db = connect().await;
    let entity_id = EntityId::new();
    let accounts = AccountRepository::new(db.clone());

    let assets_header = account(&accounts, entity_id, "1000", "Assets", AccountType::Asset, false).await;
    let cash = account(&accounts, entity_id, "1010", "Operating Cash", AccountType::Asset, true).await;
    let payables =
        account(&accounts, entity_id, "2000", "Accounts Payable", AccountType::Liability, true).await;
    let retained_earnings =
        account(&accounts, entity_id, "3100", "Retained Earnings", AccountType::Equity, true).await;
    let revenue = account(&accounts, entity_id, "4000", "Sales Revenue", AccountType::Revenue, true).await;
    let expenses =
        account(&accounts, entity_id, "5000", "Office Expenses", AccountType::Expense, true).await;

    let periods = PeriodRepository::new(db.clone())
        .create_monthly_periods(entity_id, 2024)
        .await
        .expect("create periods");

    Fixture {
        db,
        entity_id,
        cash,
        payables,
        retained_earnings,
        revenue,
        expenses,
        assets_header,
        periods,
    }
}
