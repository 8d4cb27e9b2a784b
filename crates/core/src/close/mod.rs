//! Period close orchestration rules.
//!
//! - `types` - Checklist, close options and close history
//! - `checklist` - Checklist evaluation
//! - `closing` - Closing entry generation
//! - `error` - Close error types

pub mod checklist;
pub mod closing;
pub mod error;
pub mod types;

pub use checklist::ChecklistInput;
pub use closing::ClosingActivity;
pub use error::CloseError;
pub use types::{
    Checklist, ChecklistFailure, ChecklistItem, CloseAction, CloseOptions, CloseOutcome,
    CloseRecord, ItemResult, ReportCoverage,
};

/// Stateless close rules.
pub struct CloseService;
