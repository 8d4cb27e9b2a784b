//! Reconciliation repository: bank accounts, the bank feed, matching and
//! reconciliation reports.

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::ledger::InvalidAccountReason;
use tally_core::reconciliation::{
    AutoMatchOutcome, AutoMatchSummary, BankAccount, BankTransaction, BankTransactionInput,
    Candidate, IngestSummary, MatchDecision, MatchSettings, MatchStatus, MatchingEngine,
    OutstandingItem, ReconciliationError, ReconciliationMath, ReconciliationReport,
    ReportFigures, ReviewReason,
};
use tally_core::workflow::EntryStatus;
use tally_shared::config::ReconciliationConfig;
use tally_shared::types::{
    AccountId, BankAccountId, BankTransactionId, EntityId, JournalEntryId,
    ReconciliationReportId, Principal, within_tolerance,
};

use super::ledger::parse_status;
use super::{corrupt, is_unique_violation, money, now, optional_principal, principal, utc};
use crate::entities::{
    accounts, bank_accounts, bank_transactions, journal_entries, journal_entry_lines,
    reconciliation_reports,
};

fn db_err(err: DbErr) -> ReconciliationError {
    ReconciliationError::Database(err.to_string())
}

fn bank_account_from_model(model: bank_accounts::Model) -> BankAccount {
    BankAccount {
        id: BankAccountId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        name: model.name,
        gl_account_id: AccountId::from_uuid(model.gl_account_id),
        created_at: utc(model.created_at),
    }
}

fn transaction_from_model(model: bank_transactions::Model) -> Result<BankTransaction, DbErr> {
    Ok(BankTransaction {
        id: BankTransactionId::from_uuid(model.id),
        bank_account_id: BankAccountId::from_uuid(model.bank_account_id),
        match_status: MatchStatus::parse(&model.match_status)
            .ok_or_else(|| corrupt("bank_transactions.match_status", &model.match_status))?,
        matched_entry_id: model.matched_entry_id.map(JournalEntryId::from_uuid),
        match_confidence: model.match_confidence.map(|c| c.round_dp(4)),
        matched_by: optional_principal("bank_transactions.matched_by", model.matched_by.as_deref())?,
        matched_at: model.matched_at.map(utc),
        external_id: model.external_id,
        transaction_date: model.transaction_date,
        amount: money(model.amount),
        description: model.description,
        version: model.version,
    })
}

fn report_from_model(model: reconciliation_reports::Model) -> Result<ReconciliationReport, DbErr> {
    let items = |column: &str, value: serde_json::Value| -> Result<Vec<OutstandingItem>, DbErr> {
        serde_json::from_value(value).map_err(|e| corrupt(column, &e.to_string()))
    };
    Ok(ReconciliationReport {
        id: ReconciliationReportId::from_uuid(model.id),
        bank_account_id: BankAccountId::from_uuid(model.bank_account_id),
        period_start: model.period_start,
        period_end: model.period_end,
        statement_balance: money(model.statement_balance),
        gl_balance: money(model.gl_balance),
        outstanding_deposits: items(
            "reconciliation_reports.outstanding_deposits",
            model.outstanding_deposits,
        )?,
        outstanding_checks: items(
            "reconciliation_reports.outstanding_checks",
            model.outstanding_checks,
        )?,
        figures: ReportFigures {
            outstanding_deposits_total: money(model.outstanding_deposits_total),
            outstanding_checks_total: money(model.outstanding_checks_total),
            adjusted_bank_balance: money(model.adjusted_bank_balance),
            difference: money(model.difference),
            is_reconciled: model.is_reconciled,
        },
        prepared_by: principal("reconciliation_reports.prepared_by", &model.prepared_by)?,
        created_at: utc(model.created_at),
    })
}

async fn find_bank_account<C: ConnectionTrait>(
    conn: &C,
    bank_account_id: BankAccountId,
) -> Result<bank_accounts::Model, ReconciliationError> {
    bank_accounts::Entity::find_by_id(bank_account_id.into_inner())
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(ReconciliationError::BankAccountNotFound(bank_account_id))
}

async fn find_transaction<C: ConnectionTrait>(
    conn: &C,
    transaction_id: BankTransactionId,
) -> Result<bank_transactions::Model, ReconciliationError> {
    bank_transactions::Entity::find_by_id(transaction_id.into_inner())
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(ReconciliationError::TransactionNotFound(transaction_id))
}

/// Debit-side total of each entry, to the cent.
async fn entry_totals<C: ConnectionTrait>(
    conn: &C,
    entry_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Decimal>, DbErr> {
    let mut totals = HashMap::new();
    if entry_ids.is_empty() {
        return Ok(totals);
    }
    for line in journal_entry_lines::Entity::find()
        .filter(journal_entry_lines::Column::EntryId.is_in(entry_ids))
        .all(conn)
        .await?
    {
        *totals.entry(line.entry_id).or_insert(Decimal::ZERO) += money(line.debit);
    }
    Ok(totals)
}

/// Bank transaction currently linked to each of the given entries.
async fn entry_links<C: ConnectionTrait>(
    conn: &C,
    entry_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Uuid>, DbErr> {
    if entry_ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(bank_transactions::Entity::find()
        .filter(bank_transactions::Column::MatchedEntryId.is_in(entry_ids))
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|t| t.matched_entry_id.map(|entry| (entry, t.id)))
        .collect())
}

/// Posted entries of the entity dated within `[from, to]`, as match candidates.
async fn candidates_in<C: ConnectionTrait>(
    conn: &C,
    entity_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Candidate>, DbErr> {
    let entries = journal_entries::Entity::find()
        .filter(journal_entries::Column::EntityId.eq(entity_id))
        .filter(journal_entries::Column::Status.eq(EntryStatus::Posted.as_str()))
        .filter(journal_entries::Column::EntryDate.between(from, to))
        .order_by_asc(journal_entries::Column::EntryDate)
        .order_by_asc(journal_entries::Column::EntryNumber)
        .all(conn)
        .await?;
    let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    let totals = entry_totals(conn, ids.clone()).await?;
    let links = entry_links(conn, ids).await?;

    Ok(entries
        .into_iter()
        .map(|e| Candidate {
            entry_id: JournalEntryId::from_uuid(e.id),
            entry_date: e.entry_date,
            total: totals.get(&e.id).copied().unwrap_or_default(),
            linked_transaction: links.get(&e.id).copied().map(BankTransactionId::from_uuid),
            memo: e.memo,
        })
        .collect())
}

/// Bank feed, matching and reconciliation report repository.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    db: DatabaseConnection,
    settings: MatchSettings,
    reconciled_tolerance: Decimal,
}

impl ReconciliationRepository {
    /// Creates a new reconciliation repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: &ReconciliationConfig) -> Self {
        Self {
            db,
            settings: MatchSettings::from(config),
            reconciled_tolerance: config.reconciled_tolerance,
        }
    }

    /// The matching settings in use.
    #[must_use]
    pub const fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// Registers a bank account backed by a cash account of the entity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGlAccount` unless the GL account is a posting account
    /// of the same entity.
    pub async fn create_bank_account(
        &self,
        entity_id: EntityId,
        name: &str,
        gl_account_id: AccountId,
    ) -> Result<BankAccount, ReconciliationError> {
        let account = accounts::Entity::find_by_id(gl_account_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        let reason = match &account {
            None => Some(InvalidAccountReason::NotFound),
            Some(a) if a.entity_id != entity_id.into_inner() => {
                Some(InvalidAccountReason::ForeignEntity)
            }
            Some(a) if !a.allow_posting => Some(InvalidAccountReason::NonPosting),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Err(ReconciliationError::InvalidGlAccount {
                account_id: gl_account_id,
                reason,
            });
        }

        let model = bank_accounts::ActiveModel {
            id: Set(BankAccountId::new().into_inner()),
            entity_id: Set(entity_id.into_inner()),
            name: Set(name.trim().to_string()),
            gl_account_id: Set(gl_account_id.into_inner()),
            created_at: Set(now()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;

        info!(
            bank_account_id = %model.id,
            entity_id = %entity_id,
            gl_account_id = %gl_account_id,
            "Bank account created"
        );
        Ok(bank_account_from_model(model))
    }

    /// Gets a bank account.
    ///
    /// # Errors
    ///
    /// Returns `BankAccountNotFound` if it does not exist.
    pub async fn get_bank_account(
        &self,
        bank_account_id: BankAccountId,
    ) -> Result<BankAccount, ReconciliationError> {
        find_bank_account(&self.db, bank_account_id)
            .await
            .map(bank_account_from_model)
    }

    /// Lists the bank accounts of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_bank_accounts(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<BankAccount>, ReconciliationError> {
        let models = bank_accounts::Entity::find()
            .filter(bank_accounts::Column::EntityId.eq(entity_id.into_inner()))
            .order_by_asc(bank_accounts::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(bank_account_from_model).collect())
    }

    /// Ingests bank transactions from the feed.
    ///
    /// Transactions whose external id is already known for the bank account
    /// are counted as duplicates and left untouched.
    ///
    /// # Errors
    ///
    /// Returns `BankAccountNotFound` if the bank account does not exist.
    pub async fn ingest(
        &self,
        bank_account_id: BankAccountId,
        transactions: Vec<BankTransactionInput>,
    ) -> Result<IngestSummary, ReconciliationError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        find_bank_account(&txn, bank_account_id).await?;

        let mut summary = IngestSummary::default();
        for input in transactions {
            let model = bank_transactions::ActiveModel {
                id: Set(BankTransactionId::new().into_inner()),
                bank_account_id: Set(bank_account_id.into_inner()),
                external_id: Set(input.external_id),
                transaction_date: Set(input.date),
                amount: Set(input.amount),
                description: Set(input.description),
                match_status: Set(MatchStatus::Unmatched.as_str().to_string()),
                matched_entry_id: Set(None),
                match_confidence: Set(None),
                matched_by: Set(None),
                matched_at: Set(None),
                version: Set(0),
                created_at: Set(now()),
            };
            let inserted = bank_transactions::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        bank_transactions::Column::BankAccountId,
                        bank_transactions::Column::ExternalId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .map_err(db_err)?;
            if inserted == 0 {
                summary.duplicates += 1;
            } else {
                summary.inserted += 1;
            }
        }
        txn.commit().await.map_err(db_err)?;

        info!(
            bank_account_id = %bank_account_id,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "Bank transactions ingested"
        );
        Ok(summary)
    }

    /// Lists a bank account's transactions by date, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_transactions(
        &self,
        bank_account_id: BankAccountId,
        status: Option<MatchStatus>,
    ) -> Result<Vec<BankTransaction>, ReconciliationError> {
        let mut query = bank_transactions::Entity::find()
            .filter(bank_transactions::Column::BankAccountId.eq(bank_account_id.into_inner()));
        if let Some(status) = status {
            query = query.filter(bank_transactions::Column::MatchStatus.eq(status.as_str()));
        }
        let models = query
            .order_by_asc(bank_transactions::Column::TransactionDate)
            .order_by_asc(bank_transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models
            .into_iter()
            .map(|m| transaction_from_model(m).map_err(db_err))
            .collect()
    }

    /// Gets a bank transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if it does not exist.
    pub async fn get_transaction(
        &self,
        transaction_id: BankTransactionId,
    ) -> Result<BankTransaction, ReconciliationError> {
        let model = find_transaction(&self.db, transaction_id).await?;
        transaction_from_model(model).map_err(db_err)
    }

    /// The transaction linked to an entry, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn matched_transaction_for_entry(
        &self,
        entry_id: JournalEntryId,
    ) -> Result<Option<BankTransaction>, ReconciliationError> {
        let model = bank_transactions::Entity::find()
            .filter(bank_transactions::Column::MatchedEntryId.eq(entry_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model
            .map(|m| transaction_from_model(m).map_err(db_err))
            .transpose()
    }

    /// Runs the matcher over the bank account's unmatched transactions.
    ///
    /// Works from a snapshot of unmatched transactions and candidate entries.
    /// Each match is committed on its own; a match whose preconditions no
    /// longer hold at commit time is reported for review.
    ///
    /// # Errors
    ///
    /// Returns `BankAccountNotFound`, or an error if loading the snapshot
    /// fails.
    pub async fn auto_match(
        &self,
        bank_account_id: BankAccountId,
    ) -> Result<AutoMatchSummary, ReconciliationError> {
        let account = find_bank_account(&self.db, bank_account_id).await?;
        let unmatched = bank_transactions::Entity::find()
            .filter(bank_transactions::Column::BankAccountId.eq(account.id))
            .filter(bank_transactions::Column::MatchStatus.eq(MatchStatus::Unmatched.as_str()))
            .order_by_asc(bank_transactions::Column::TransactionDate)
            .order_by_asc(bank_transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut summary = AutoMatchSummary::default();
        let (Some(first), Some(last)) = (unmatched.first(), unmatched.last()) else {
            return Ok(summary);
        };
        let window = Duration::days(self.settings.date_window_days);
        let mut candidates = candidates_in(
            &self.db,
            account.entity_id,
            first.transaction_date - window,
            last.transaction_date + window,
        )
        .await
        .map_err(db_err)?;

        for model in unmatched {
            let transaction_id = BankTransactionId::from_uuid(model.id);
            let amount = money(model.amount);
            let eligible = MatchingEngine::eligible(
                transaction_id,
                model.transaction_date,
                amount,
                &candidates,
                &self.settings,
            );
            let decision = MatchingEngine::decide(&model.description, &eligible, &self.settings);

            let decision = match decision {
                MatchDecision::Match { entry_id, confidence } => {
                    match self
                        .commit_match(transaction_id, entry_id, confidence, None)
                        .await
                    {
                        Ok(_) => {
                            for candidate in &mut candidates {
                                if candidate.entry_id == entry_id {
                                    candidate.linked_transaction = Some(transaction_id);
                                }
                            }
                            MatchDecision::Match { entry_id, confidence }
                        }
                        Err(err) => {
                            warn!(
                                transaction_id = %transaction_id,
                                entry_id = %entry_id,
                                error = %err,
                                "Auto-match precondition failed at commit"
                            );
                            MatchDecision::Review(ReviewReason::PreconditionFailed {
                                entry_id,
                                detail: err.to_string(),
                            })
                        }
                    }
                }
                other => other,
            };
            debug!(transaction_id = %transaction_id, decision = ?decision, "Auto-match decision");
            summary.record(AutoMatchOutcome {
                transaction_id,
                decision,
            });
        }

        info!(
            bank_account_id = %bank_account_id,
            matched = summary.matched.len(),
            suggested = summary.suggested.len(),
            review = summary.review.len(),
            "Auto-match completed"
        );
        Ok(summary)
    }

    /// Manually links a transaction to a posted entry.
    ///
    /// # Errors
    ///
    /// Returns `AmountMismatch`, `AlreadyMatched`, `EntryAlreadyMatched`,
    /// `EntryNotPosted`, `EntityMismatch`, the not-found errors, or
    /// `ConcurrentModification`.
    pub async fn match_transaction(
        &self,
        transaction_id: BankTransactionId,
        entry_id: JournalEntryId,
        principal: &Principal,
    ) -> Result<BankTransaction, ReconciliationError> {
        let transaction = self
            .commit_match(transaction_id, entry_id, Decimal::ONE, Some(principal))
            .await?;
        info!(
            transaction_id = %transaction_id,
            entry_id = %entry_id,
            principal = %principal,
            "Bank transaction matched"
        );
        Ok(transaction)
    }

    /// Clears a transaction's link. Unmatching an unmatched transaction is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` or `ConcurrentModification`.
    pub async fn unmatch(
        &self,
        transaction_id: BankTransactionId,
        principal: &Principal,
    ) -> Result<BankTransaction, ReconciliationError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let model = find_transaction(&txn, transaction_id).await?;
        if model.matched_entry_id.is_none() {
            return transaction_from_model(model).map_err(db_err);
        }

        let result = bank_transactions::Entity::update_many()
            .col_expr(
                bank_transactions::Column::MatchStatus,
                Expr::value(MatchStatus::Unmatched.as_str()),
            )
            .col_expr(bank_transactions::Column::MatchedEntryId, Expr::value(None::<Uuid>))
            .col_expr(bank_transactions::Column::MatchConfidence, Expr::value(None::<Decimal>))
            .col_expr(bank_transactions::Column::MatchedBy, Expr::value(None::<String>))
            .col_expr(
                bank_transactions::Column::MatchedAt,
                Expr::value(None::<sea_orm::prelude::DateTimeWithTimeZone>),
            )
            .col_expr(bank_transactions::Column::Version, Expr::value(model.version + 1))
            .filter(bank_transactions::Column::Id.eq(model.id))
            .filter(bank_transactions::Column::Version.eq(model.version))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(ReconciliationError::ConcurrentModification(transaction_id));
        }
        let updated = find_transaction(&txn, transaction_id).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            transaction_id = %transaction_id,
            entry_id = ?model.matched_entry_id,
            principal = %principal,
            "Bank transaction unmatched"
        );
        transaction_from_model(updated).map_err(db_err)
    }

    /// Generates and stores a reconciliation report as of `as_of`.
    ///
    /// When the report reconciles, matched transactions dated on or before
    /// `as_of` become `cleared`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` if `period_start` is after `as_of`, or
    /// `BankAccountNotFound`.
    pub async fn generate_report(
        &self,
        bank_account_id: BankAccountId,
        period_start: NaiveDate,
        as_of: NaiveDate,
        statement_balance: Decimal,
        prepared_by: &Principal,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        if period_start > as_of {
            return Err(ReconciliationError::InvalidPeriod {
                start: period_start,
                end: as_of,
            });
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        let account = find_bank_account(&txn, bank_account_id).await?;

        let lines = journal_entry_lines::Entity::find()
            .find_also_related(journal_entries::Entity)
            .filter(journal_entry_lines::Column::AccountId.eq(account.gl_account_id))
            .filter(journal_entries::Column::EntryDate.lte(as_of))
            .filter(journal_entries::Column::Status.is_in([
                EntryStatus::Posted.as_str(),
                EntryStatus::Reversed.as_str(),
            ]))
            .all(&txn)
            .await
            .map_err(db_err)?;

        let mut per_entry: BTreeMap<(NaiveDate, i64), (journal_entries::Model, Decimal)> =
            BTreeMap::new();
        let mut amounts = Vec::with_capacity(lines.len());
        for (line, entry) in lines {
            let Some(entry) = entry else { continue };
            let (debit, credit) = (money(line.debit), money(line.credit));
            amounts.push((debit, credit));
            per_entry
                .entry((entry.entry_date, entry.entry_number))
                .or_insert_with(|| (entry, Decimal::ZERO))
                .1 += debit - credit;
        }
        let gl_balance = ReconciliationMath::gl_balance(amounts);

        let entry_ids: Vec<Uuid> = per_entry.values().map(|(e, _)| e.id).collect();
        let matched: HashSet<Uuid> = entry_links(&txn, entry_ids)
            .await
            .map_err(db_err)?
            .into_keys()
            .collect();
        let outstanding = per_entry
            .into_values()
            .filter(|(entry, _)| !matched.contains(&entry.id))
            .map(|(entry, net)| OutstandingItem {
                entry_id: JournalEntryId::from_uuid(entry.id),
                entry_number: entry.entry_number,
                entry_date: entry.entry_date,
                memo: entry.memo,
                amount: net,
            });
        let (deposits, checks) = ReconciliationMath::split_outstanding(outstanding);
        let figures = ReconciliationMath::figures(
            statement_balance,
            gl_balance,
            &deposits,
            &checks,
            self.reconciled_tolerance,
        );

        let to_json = |items: &[OutstandingItem]| {
            serde_json::to_value(items)
                .map_err(|e| ReconciliationError::Database(format!("report serialization: {e}")))
        };
        let model = reconciliation_reports::ActiveModel {
            id: Set(ReconciliationReportId::new().into_inner()),
            bank_account_id: Set(account.id),
            period_start: Set(period_start),
            period_end: Set(as_of),
            statement_balance: Set(statement_balance),
            gl_balance: Set(gl_balance),
            outstanding_deposits: Set(to_json(&deposits)?),
            outstanding_checks: Set(to_json(&checks)?),
            outstanding_deposits_total: Set(figures.outstanding_deposits_total),
            outstanding_checks_total: Set(figures.outstanding_checks_total),
            adjusted_bank_balance: Set(figures.adjusted_bank_balance),
            difference: Set(figures.difference),
            is_reconciled: Set(figures.is_reconciled),
            prepared_by: Set(prepared_by.as_str().to_string()),
            created_at: Set(now()),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        let mut cleared = 0;
        if figures.is_reconciled {
            cleared = bank_transactions::Entity::update_many()
                .col_expr(
                    bank_transactions::Column::MatchStatus,
                    Expr::value(MatchStatus::Cleared.as_str()),
                )
                .col_expr(
                    bank_transactions::Column::Version,
                    Expr::col(bank_transactions::Column::Version).add(1),
                )
                .filter(bank_transactions::Column::BankAccountId.eq(account.id))
                .filter(bank_transactions::Column::MatchStatus.eq(MatchStatus::Matched.as_str()))
                .filter(bank_transactions::Column::TransactionDate.lte(as_of))
                .exec(&txn)
                .await
                .map_err(db_err)?
                .rows_affected;
        }
        txn.commit().await.map_err(db_err)?;

        if !figures.is_reconciled {
            warn!(
                bank_account_id = %bank_account_id,
                as_of = %as_of,
                difference = %figures.difference,
                "Reconciliation report does not reconcile"
            );
        }
        info!(
            report_id = %model.id,
            bank_account_id = %bank_account_id,
            as_of = %as_of,
            gl_balance = %gl_balance,
            adjusted_bank_balance = %figures.adjusted_bank_balance,
            is_reconciled = figures.is_reconciled,
            cleared,
            principal = %prepared_by,
            "Reconciliation report generated"
        );
        report_from_model(model).map_err(db_err)
    }

    /// Lists a bank account's reports, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_reports(
        &self,
        bank_account_id: BankAccountId,
    ) -> Result<Vec<ReconciliationReport>, ReconciliationError> {
        let models = reconciliation_reports::Entity::find()
            .filter(reconciliation_reports::Column::BankAccountId.eq(bank_account_id.into_inner()))
            .order_by_asc(reconciliation_reports::Column::PeriodEnd)
            .order_by_asc(reconciliation_reports::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models
            .into_iter()
            .map(|m| report_from_model(m).map_err(db_err))
            .collect()
    }

    /// Gets a report.
    ///
    /// # Errors
    ///
    /// Returns `ReportNotFound` if it does not exist.
    pub async fn get_report(
        &self,
        report_id: ReconciliationReportId,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let model = reconciliation_reports::Entity::find_by_id(report_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(ReconciliationError::ReportNotFound(report_id))?;
        report_from_model(model).map_err(db_err)
    }

    /// Links a transaction to an entry after re-checking every precondition
    /// in a fresh transaction.
    async fn commit_match(
        &self,
        transaction_id: BankTransactionId,
        entry_id: JournalEntryId,
        confidence: Decimal,
        matched_by: Option<&Principal>,
    ) -> Result<BankTransaction, ReconciliationError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let transaction = find_transaction(&txn, transaction_id).await?;
        if let Some(existing) = transaction.matched_entry_id {
            return Err(ReconciliationError::AlreadyMatched {
                transaction_id,
                entry_id: JournalEntryId::from_uuid(existing),
            });
        }

        let entry = journal_entries::Entity::find_by_id(entry_id.into_inner())
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(ReconciliationError::EntryNotFound(entry_id))?;
        let status = parse_status(&entry.status).map_err(db_err)?;
        if status != EntryStatus::Posted {
            return Err(ReconciliationError::EntryNotPosted { entry_id, status });
        }

        let account = find_bank_account(&txn, BankAccountId::from_uuid(transaction.bank_account_id))
            .await?;
        if account.entity_id != entry.entity_id {
            return Err(ReconciliationError::EntityMismatch {
                transaction_id,
                entry_id,
            });
        }

        if let Some(other) = entry_links(&txn, vec![entry.id])
            .await
            .map_err(db_err)?
            .get(&entry.id)
        {
            return Err(ReconciliationError::EntryAlreadyMatched {
                entry_id,
                transaction_id: BankTransactionId::from_uuid(*other),
            });
        }

        let amount = money(transaction.amount).abs();
        let total = entry_totals(&txn, vec![entry.id])
            .await
            .map_err(db_err)?
            .get(&entry.id)
            .copied()
            .unwrap_or_default();
        if !within_tolerance(total, amount, self.settings.amount_tolerance) {
            return Err(ReconciliationError::AmountMismatch {
                transaction_id,
                entry_id,
                transaction_amount: amount,
                entry_total: total,
            });
        }

        let result = bank_transactions::Entity::update_many()
            .col_expr(
                bank_transactions::Column::MatchStatus,
                Expr::value(MatchStatus::Matched.as_str()),
            )
            .col_expr(bank_transactions::Column::MatchedEntryId, Expr::value(entry.id))
            .col_expr(bank_transactions::Column::MatchConfidence, Expr::value(confidence))
            .col_expr(
                bank_transactions::Column::MatchedBy,
                Expr::value(matched_by.map(|p| p.as_str().to_string())),
            )
            .col_expr(bank_transactions::Column::MatchedAt, Expr::value(now()))
            .col_expr(bank_transactions::Column::Version, Expr::value(transaction.version + 1))
            .filter(bank_transactions::Column::Id.eq(transaction.id))
            .filter(bank_transactions::Column::Version.eq(transaction.version))
            .filter(bank_transactions::Column::MatchedEntryId.is_null())
            .exec(&txn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ReconciliationError::ConcurrentModification(transaction_id)
                } else {
                    db_err(e)
                }
            })?;
        if result.rows_affected == 0 {
            return Err(ReconciliationError::ConcurrentModification(transaction_id));
        }

        let updated = find_transaction(&txn, transaction_id).await?;
        txn.commit().await.map_err(db_err)?;
        transaction_from_model(updated).map_err(db_err)
    }
}
