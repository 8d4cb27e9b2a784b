//! Accounting period and lock types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_shared::types::{EntityId, PeriodId, PeriodLockId, Principal};

use super::error::PeriodError;

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `start > end`.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::InvalidDateRange` if the range is inverted.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The single-day range `date..=date`.
    #[must_use]
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Returns true if `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Returns true if the two ranges share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Length of an accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    /// Calendar month.
    Month,
    /// Quarter.
    Quarter,
    /// Full year.
    Year,
}

impl PeriodType {
    /// Returns the string representation of the period type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// Parses a period type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "month" => Some(Self::Month),
            "quarter" => Some(Self::Quarter),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

/// Status of an accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Never closed.
    Open,
    /// Closed and locked.
    Closed,
    /// Closed once, then reopened with a reason.
    Reopened,
}

impl PeriodStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "reopened" => Some(Self::Reopened),
            _ => None,
        }
    }

    /// Returns true if the period may be closed.
    #[must_use]
    pub fn can_close(&self) -> bool {
        matches!(self, Self::Open | Self::Reopened)
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating an accounting period.
#[derive(Debug, Clone)]
pub struct NewPeriod {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Display name (e.g. "October 2025").
    pub name: String,
    /// Period length.
    pub period_type: PeriodType,
    /// Covered dates.
    pub range: DateRange,
}

/// An accounting period of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Period id.
    pub id: PeriodId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Display name.
    pub name: String,
    /// Period length.
    pub period_type: PeriodType,
    /// First day.
    pub start_date: NaiveDate,
    /// Last day.
    pub end_date: NaiveDate,
    /// Close status.
    pub status: PeriodStatus,
    /// Who last closed the period.
    pub closed_by: Option<Principal>,
    /// When it was last closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Why it was last reopened.
    pub reopen_reason: Option<String>,
    /// Optimistic concurrency token.
    pub version: i64,
}

impl AccountingPeriod {
    /// The covered date range.
    #[must_use]
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// A lock over a date range of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLock {
    /// Lock id.
    pub id: PeriodLockId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// The period this lock was created by closing, if any.
    pub period_id: Option<PeriodId>,
    /// First locked day.
    pub start_date: NaiveDate,
    /// Last locked day.
    pub end_date: NaiveDate,
    /// Why the range was locked.
    pub reason: String,
    /// Who locked it.
    pub locked_by: Principal,
    /// When it was locked.
    pub locked_at: DateTime<Utc>,
    /// False once unlocked.
    pub is_active: bool,
    /// Who unlocked it.
    pub unlocked_by: Option<Principal>,
    /// When it was unlocked.
    pub unlocked_at: Option<DateTime<Utc>>,
    /// Why it was unlocked.
    pub unlock_reason: Option<String>,
}

impl PeriodLock {
    /// The locked date range.
    #[must_use]
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}
