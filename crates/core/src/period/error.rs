//! Period and lock error types.

use chrono::NaiveDate;
use tally_shared::types::{EntityId, PeriodId, PeriodLockId};
use thiserror::Error;

use super::types::PeriodStatus;

/// Errors that can occur managing periods and locks.
#[derive(Debug, Error)]
pub enum PeriodError {
    /// The new lock intersects an active lock.
    #[error("Lock {start}..={end} for entity {entity_id} overlaps active lock {existing}")]
    OverlappingLock {
        /// The entity.
        entity_id: EntityId,
        /// Requested first day.
        start: NaiveDate,
        /// Requested last day.
        end: NaiveDate,
        /// The lock it collides with.
        existing: PeriodLockId,
    },

    /// The new period intersects an existing period.
    #[error("Period {start}..={end} for entity {entity_id} overlaps period {existing}")]
    OverlappingPeriod {
        /// The entity.
        entity_id: EntityId,
        /// Requested first day.
        start: NaiveDate,
        /// Requested last day.
        end: NaiveDate,
        /// The period it collides with.
        existing: PeriodId,
    },

    /// Start date is after end date.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },

    /// No active lock with exactly this range.
    #[error("No active lock {start}..={end} for entity {entity_id}")]
    LockNotFound {
        /// The entity.
        entity_id: EntityId,
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },

    /// Period not found.
    #[error("Accounting period not found: {0}")]
    PeriodNotFound(PeriodId),

    /// A reason is mandatory for this operation.
    #[error("A reason is required to {0}")]
    ReasonRequired(&'static str),

    /// The period is in the wrong status for the operation.
    #[error("Period {period_id} is {status}")]
    InvalidStatus {
        /// The period.
        period_id: PeriodId,
        /// Its current status.
        status: PeriodStatus,
    },

    /// A version check failed; the caller may retry.
    #[error("Concurrent modification of period {0}, please retry")]
    ConcurrentModification(PeriodId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl PeriodError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OverlappingLock { .. } => "OVERLAPPING_LOCK",
            Self::OverlappingPeriod { .. } => "OVERLAPPING_PERIOD",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::LockNotFound { .. } => "LOCK_NOT_FOUND",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::ReasonRequired(_) => "REASON_REQUIRED",
            Self::InvalidStatus { .. } => "INVALID_PERIOD_STATUS",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidDateRange { .. } | Self::ReasonRequired(_) => 400,
            Self::LockNotFound { .. } | Self::PeriodNotFound(_) => 404,
            Self::OverlappingLock { .. }
            | Self::OverlappingPeriod { .. }
            | Self::InvalidStatus { .. }
            | Self::ConcurrentModification(_) => 409,
            Self::Database(_) => 500,
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_lock_error() {
        let err = PeriodError::OverlappingLock {
            entity_id: EntityId::new(),
            start: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 10, 31).unwrap(),
            existing: PeriodLockId::new(),
        };
        assert_eq!(err.error_code(), "OVERLAPPING_LOCK");
        assert_eq!(err.http_status_code(), 409);
        assert!(err.to_string().contains("2025-10-01"));
    }

    #[test]
    fn test_reason_required_error() {
        let err = PeriodError::ReasonRequired("unlock a period");
        assert_eq!(err.to_string(), "A reason is required to unlock a period");
        assert_eq!(err.http_status_code(), 400);
        assert!(!err.is_retryable());
    }
}
