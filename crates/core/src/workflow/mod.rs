//! Journal entry lifecycle management.
//!
//! This module implements the entry state machine, the authorization
//! policy that gates approvals, and reversing entry construction.
//!
//! # Modules
//!
//! - `types` - Entry status, state payloads and workflow actions
//! - `error` - Workflow-specific error types
//! - `policy` - Authorized approver set and approval mode
//! - `service` - State transition function
//! - `reversal` - Reversing line construction

pub mod error;
pub mod policy;
pub mod reversal;
pub mod service;
pub mod types;

#[cfg(test)]
mod reversal_props;
#[cfg(test)]
mod service_props;

pub use error::WorkflowError;
pub use policy::{ApprovalMode, AuthorizationPolicy};
pub use reversal::ReversalService;
pub use service::{Transition, TransitionContext, WorkflowService};
pub use types::{EntryState, EntryStatus, WorkflowAction};
