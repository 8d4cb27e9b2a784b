//! Close checklist evaluation.

use std::collections::HashSet;
use tally_shared::types::{AccountId, BankAccountId, JournalEntryId};

use super::CloseService;
use super::types::{Checklist, ChecklistFailure, ChecklistItem, ItemResult, ReportCoverage};
use crate::period::AccountingPeriod;
use crate::reports::TrialBalance;

/// Everything the checklist reads, gathered in one read transaction.
#[derive(Debug, Clone)]
pub struct ChecklistInput {
    /// The period being closed.
    pub period: AccountingPeriod,
    /// Every bank account of the entity.
    pub bank_accounts: Vec<BankAccountId>,
    /// Reconciliation reports of those bank accounts.
    pub reports: Vec<ReportCoverage>,
    /// Draft or pending entries dated inside the period.
    pub open_entries: Vec<JournalEntryId>,
    /// Current trial balance of the entity.
    pub trial_balance: TrialBalance,
    /// Posting accounts flagged `requires_depreciation`.
    pub depreciation_accounts: Vec<AccountId>,
    /// Accounts touched by posted adjusting entries dated inside the period.
    pub adjusted_accounts: HashSet<AccountId>,
}

impl CloseService {
    /// Evaluates all four checklist items.
    #[must_use]
    pub fn evaluate(input: &ChecklistInput) -> Checklist {
        let items = ChecklistItem::ALL
            .iter()
            .map(|item| ItemResult {
                item: *item,
                failure: Self::check(*item, input),
            })
            .collect();

        Checklist {
            period_id: input.period.id,
            items,
            debit_total: input.trial_balance.debit_total,
            credit_total: input.trial_balance.credit_total,
        }
    }

    /// Whether a report reconciles the bank account over the whole period.
    #[must_use]
    pub fn report_covers(report: &ReportCoverage, period: &AccountingPeriod) -> bool {
        report.is_reconciled
            && report.period_end == period.end_date
            && report.period_start <= period.start_date
    }

    fn check(item: ChecklistItem, input: &ChecklistInput) -> Option<ChecklistFailure> {
        match item {
            ChecklistItem::BankReconciliation => {
                let bank_account_ids: Vec<BankAccountId> = input
                    .bank_accounts
                    .iter()
                    .filter(|id| {
                        !input.reports.iter().any(|r| {
                            r.bank_account_id == **id && Self::report_covers(r, &input.period)
                        })
                    })
                    .copied()
                    .collect();
                (!bank_account_ids.is_empty())
                    .then_some(ChecklistFailure::UnreconciledBankAccounts { bank_account_ids })
            }
            ChecklistItem::EntriesPosted => (!input.open_entries.is_empty()).then(|| {
                ChecklistFailure::OpenEntries {
                    entry_ids: input.open_entries.clone(),
                }
            }),
            ChecklistItem::TrialBalance => (!input.trial_balance.is_balanced()).then_some(
                ChecklistFailure::TrialBalanceOutOfBalance {
                    debit_total: input.trial_balance.debit_total,
                    credit_total: input.trial_balance.credit_total,
                },
            ),
            ChecklistItem::Depreciation => {
                let account_ids: Vec<AccountId> = input
                    .depreciation_accounts
                    .iter()
                    .filter(|id| !input.adjusted_accounts.contains(id))
                    .copied()
                    .collect();
                (!account_ids.is_empty())
                    .then_some(ChecklistFailure::MissingDepreciation { account_ids })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::{PeriodStatus, PeriodType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tally_shared::types::{EntityId, PeriodId};

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn october() -> AccountingPeriod {
        AccountingPeriod {
            id: PeriodId::new(),
            entity_id: EntityId::new(),
            name: "October 2024".into(),
            period_type: PeriodType::Month,
            start_date: date(10, 1),
            end_date: date(10, 31),
            status: PeriodStatus::Open,
            closed_by: None,
            closed_at: None,
            reopen_reason: None,
            version: 0,
        }
    }

    fn clean_input() -> ChecklistInput {
        ChecklistInput {
            period: october(),
            bank_accounts: Vec::new(),
            reports: Vec::new(),
            open_entries: Vec::new(),
            trial_balance: TrialBalance {
                lines: Vec::new(),
                debit_total: dec!(1000),
                credit_total: dec!(1000),
            },
            depreciation_accounts: Vec::new(),
            adjusted_accounts: HashSet::new(),
        }
    }

    #[test]
    fn test_clean_period_passes() {
        let checklist = CloseService::evaluate(&clean_input());
        assert!(checklist.is_complete());
        assert_eq!(checklist.items.len(), 4);
        assert!(checklist.failures().is_empty());
    }

    #[test]
    fn test_open_entry_is_listed() {
        let mut input = clean_input();
        let draft = JournalEntryId::new();
        input.open_entries.push(draft);

        let checklist = CloseService::evaluate(&input);
        assert!(!checklist.is_complete());
        assert_eq!(
            checklist.failures(),
            vec![ChecklistFailure::OpenEntries {
                entry_ids: vec![draft]
            }]
        );
    }

    #[test]
    fn test_bank_account_needs_covering_reconciled_report() {
        let mut input = clean_input();
        let bank = BankAccountId::new();
        input.bank_accounts.push(bank);
        input.reports.push(ReportCoverage {
            bank_account_id: bank,
            period_start: date(10, 1),
            period_end: date(10, 30),
            is_reconciled: true,
        });
        input.reports.push(ReportCoverage {
            bank_account_id: bank,
            period_start: date(10, 1),
            period_end: date(10, 31),
            is_reconciled: false,
        });

        let failures = CloseService::evaluate(&input).failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].item(), ChecklistItem::BankReconciliation);

        input.reports.push(ReportCoverage {
            bank_account_id: bank,
            period_start: date(9, 1),
            period_end: date(10, 31),
            is_reconciled: true,
        });
        assert!(CloseService::evaluate(&input).is_complete());
    }

    #[test]
    fn test_trial_balance_out_of_balance() {
        let mut input = clean_input();
        input.trial_balance.credit_total = dec!(999.99);
        let failures = CloseService::evaluate(&input).failures();
        assert_eq!(
            failures,
            vec![ChecklistFailure::TrialBalanceOutOfBalance {
                debit_total: dec!(1000),
                credit_total: dec!(999.99),
            }]
        );
    }

    #[test]
    fn test_depreciation_requires_adjusting_entry() {
        let mut input = clean_input();
        let equipment = AccountId::new();
        let vehicles = AccountId::new();
        input.depreciation_accounts = vec![equipment, vehicles];
        input.adjusted_accounts.insert(equipment);

        let failures = CloseService::evaluate(&input).failures();
        assert_eq!(
            failures,
            vec![ChecklistFailure::MissingDepreciation {
                account_ids: vec![vehicles]
            }]
        );
    }

    #[test]
    fn test_checklist_snapshot_serializes() {
        let mut input = clean_input();
        input.trial_balance.debit_total = Decimal::ZERO;
        let checklist = CloseService::evaluate(&input);
        let json = serde_json::to_value(&checklist).unwrap();
        assert_eq!(json["items"][2]["item"], "trial_balance");
        assert_eq!(json["items"][2]["failure"]["item"], "trial_balance_out_of_balance");
        let back: Checklist = serde_json::from_value(json).unwrap();
        assert_eq!(back, checklist);
    }
}
