//! Accounting periods and period locks.
//!
//! - `types` - Periods, locks and date ranges
//! - `error` - Period error types
//! - `service` - Postability, overlap and period generation rules

pub mod error;
pub mod service;
pub mod types;

pub use error::PeriodError;
pub use service::PeriodService;
pub use types::{
    AccountingPeriod, DateRange, NewPeriod, PeriodLock, PeriodStatus, PeriodType,
};
