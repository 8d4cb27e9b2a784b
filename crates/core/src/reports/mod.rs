//! Ledger reports.
//!
//! - Trial Balance

pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use service::ReportService;
pub use types::{TrialBalance, TrialBalanceLine};
