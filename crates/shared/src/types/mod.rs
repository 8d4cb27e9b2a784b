//! Common types used across the application.

pub mod id;
pub mod money;
pub mod principal;

pub use id::*;
pub use money::{CENT, equal_to_the_cent, within_tolerance};
pub use principal::{Principal, PrincipalError};
