//! Chart of Accounts registry types.
//!
//! - `types` - Account types, normal balance and the account record
//! - `balance` - Running balance rules applied on posting

pub mod balance;
pub mod types;

#[cfg(test)]
mod balance_props;

pub use balance::{AccountBalance, balance_change};
pub use types::{Account, AccountType, NewAccount, NormalBalance};
