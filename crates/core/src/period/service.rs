//! Period lock rules.
//!
//! Pure rules only; the repository feeds in the locks and periods it read
//! inside its transaction.

use chrono::NaiveDate;
use tally_shared::types::EntityId;

use super::error::PeriodError;
use super::types::{AccountingPeriod, DateRange, NewPeriod, PeriodStatus, PeriodType};

/// Stateless period rules.
pub struct PeriodService;

impl PeriodService {
    /// A date is postable when no active lock covers it.
    #[must_use]
    pub fn is_postable(active_locks: &[DateRange], date: NaiveDate) -> bool {
        !active_locks.iter().any(|lock| lock.contains(date))
    }

    /// Returns the key of the first existing range overlapping `range`.
    pub fn find_overlap<K>(
        existing: impl IntoIterator<Item = (K, DateRange)>,
        range: &DateRange,
    ) -> Option<K> {
        existing
            .into_iter()
            .find(|(_, other)| other.overlaps(range))
            .map(|(key, _)| key)
    }

    /// Trims `reason` and rejects it when empty.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::ReasonRequired` naming the operation.
    pub fn require_reason(reason: &str, operation: &'static str) -> Result<String, PeriodError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PeriodError::ReasonRequired(operation));
        }
        Ok(reason.to_string())
    }

    /// Checks that a period may be closed.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::InvalidStatus` if it is already closed.
    pub fn validate_can_close(period: &AccountingPeriod) -> Result<(), PeriodError> {
        if !period.status.can_close() {
            return Err(PeriodError::InvalidStatus {
                period_id: period.id,
                status: period.status,
            });
        }
        Ok(())
    }

    /// Checks that a period may be reopened.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::InvalidStatus` unless the period is closed.
    pub fn validate_can_reopen(period: &AccountingPeriod) -> Result<(), PeriodError> {
        if period.status != PeriodStatus::Closed {
            return Err(PeriodError::InvalidStatus {
                period_id: period.id,
                status: period.status,
            });
        }
        Ok(())
    }

    /// The twelve calendar months of `year`.
    #[must_use]
    pub fn monthly_periods(entity_id: EntityId, year: i32) -> Vec<NewPeriod> {
        (1..=12)
            .filter_map(|month| {
                let start = NaiveDate::from_ymd_opt(year, month, 1)?;
                let end = last_day_of_month(year, month)?;
                Some(NewPeriod {
                    entity_id,
                    name: format!("{} {year}", month_name(month)),
                    period_type: PeriodType::Month,
                    range: DateRange { start, end },
                })
            })
            .collect()
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next.pred_opt()
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}
