//! Development data seeder for Tally.
//!
//! Seeds a demo entity with a small chart of accounts, the monthly periods of
//! the current year, one bank account with a few statement lines and a posted
//! opening entry. Running it twice is a no-op.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tally_core::accounts::{AccountType, NewAccount};
use tally_core::ledger::{LineInput, NewEntry};
use tally_core::reconciliation::BankTransactionInput;
use tally_core::workflow::AuthorizationPolicy;
use tally_db::{AccountRepository, LedgerRepository, PeriodRepository, ReconciliationRepository};
use tally_shared::AppConfig;
use tally_shared::types::{AccountId, EntityId, Principal};

/// Demo entity id, stable across runs.
const DEMO_ENTITY_ID: Uuid = Uuid::from_u128(1);

const CHART: &[(&str, &str, AccountType, bool)] = &[
    ("1000", "Assets", AccountType::Asset, false),
    ("1010", "Operating Cash", AccountType::Asset, true),
    ("1500", "Equipment", AccountType::Asset, true),
    ("2000", "Accounts Payable", AccountType::Liability, true),
    ("3000", "Owner Capital", AccountType::Equity, true),
    ("3100", "Retained Earnings", AccountType::Equity, true),
    ("4000", "Sales Revenue", AccountType::Revenue, true),
    ("5000", "Office Expenses", AccountType::Expense, true),
    ("5100", "Depreciation Expense", AccountType::Expense, true),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info,seeder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = tally_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let entity_id = EntityId::from_uuid(DEMO_ENTITY_ID);
    let accounts = AccountRepository::new(db.clone());
    if !accounts.list_accounts(entity_id).await?.is_empty() {
        info!(entity_id = %entity_id, "Demo entity already seeded, skipping");
        return Ok(());
    }

    let mut cash = None;
    let mut capital = None;
    for &(number, name, account_type, allow_posting) in CHART {
        let account = accounts
            .create_account(NewAccount {
                entity_id,
                number: number.to_string(),
                name: name.to_string(),
                account_type,
                allow_posting,
                requires_depreciation: number == "1500",
            })
            .await?;
        match number {
            "1010" => cash = Some(account.id),
            "3000" => capital = Some(account.id),
            _ => {}
        }
    }
    let cash = cash.context("chart has no cash account")?;
    let capital = capital.context("chart has no capital account")?;
    info!(entity_id = %entity_id, accounts = CHART.len(), "Seeded chart of accounts");

    let year = Utc::now().year();
    let periods = PeriodRepository::new(db.clone())
        .create_monthly_periods(entity_id, year)
        .await?;
    info!(year, periods = periods.len(), "Seeded monthly periods");

    let opened_on = NaiveDate::from_ymd_opt(year, 1, 2).context("invalid opening date")?;
    seed_opening_entry(&db, &config, entity_id, opened_on, cash, capital).await?;

    let reconciliation = ReconciliationRepository::new(db.clone(), &config.reconciliation);
    let bank = reconciliation
        .create_bank_account(entity_id, "Operating Checking", cash)
        .await?;
    let summary = reconciliation
        .ingest(
            bank.id,
            vec![
                BankTransactionInput {
                    external_id: "demo-0001".to_string(),
                    date: opened_on,
                    amount: Decimal::new(25_000_00, 2),
                    description: "Owner capital deposit".to_string(),
                },
                BankTransactionInput {
                    external_id: "demo-0002".to_string(),
                    date: opened_on,
                    amount: Decimal::new(-15_00, 2),
                    description: "Monthly service fee".to_string(),
                },
            ],
        )
        .await?;
    info!(
        bank_account_id = %bank.id,
        inserted = summary.inserted,
        "Seeded bank account"
    );

    info!("Seeding complete");
    Ok(())
}

/// Posts the owner's opening capital through the approval workflow.
async fn seed_opening_entry(
    db: &sea_orm::DatabaseConnection,
    config: &AppConfig,
    entity_id: EntityId,
    date: NaiveDate,
    cash: AccountId,
    capital: AccountId,
) -> anyhow::Result<()> {
    let clerk = Principal::new("clerk@tally.dev")?;
    let approvers = [
        Principal::new("controller@tally.dev")?,
        Principal::new("cfo@tally.dev")?,
    ];
    let policy = AuthorizationPolicy::new(approvers.clone(), config.ledger.approval_mode);
    let ledger = LedgerRepository::new(db.clone(), policy);

    let amount = Decimal::new(25_000_00, 2);
    let entry = ledger
        .create_entry(NewEntry::manual(
            entity_id,
            date,
            "Opening capital",
            vec![
                LineInput::debit(cash, amount),
                LineInput::credit(capital, amount),
            ],
            clerk.clone(),
        ))
        .await?;
    ledger.submit(entry.id, clerk).await?;
    let mut posted = None;
    for approver in approvers.iter().take(ledger.policy().required_approvals()) {
        posted = Some(ledger.approve(entry.id, approver.clone()).await?);
    }
    if let Some(entry) = posted {
        info!(entry = %entry.display_number(), status = %entry.status(), "Seeded opening entry");
    }
    Ok(())
}
