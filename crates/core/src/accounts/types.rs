//! Chart of Accounts domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_shared::types::{AccountId, EntityId};

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Asset account.
    Asset,
    /// Liability account.
    Liability,
    /// Equity account.
    Equity,
    /// Revenue account.
    Revenue,
    /// Expense account.
    Expense,
}

impl AccountType {
    /// Returns the string representation of the account type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }

    /// Parses an account type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asset" => Some(Self::Asset),
            "liability" => Some(Self::Liability),
            "equity" => Some(Self::Equity),
            "revenue" => Some(Self::Revenue),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    /// Asset/Expense are debit-normal; Liability/Equity/Revenue are credit-normal.
    #[must_use]
    pub fn normal_balance(&self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Returns true for income statement accounts, which are zeroed at year end.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Revenue | Self::Expense)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The side on which an account naturally increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    /// Debit-normal (Asset, Expense).
    Debit,
    /// Credit-normal (Liability, Equity, Revenue).
    Credit,
}

impl NormalBalance {
    /// Returns the string representation of the normal balance.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    /// Parses a normal balance from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debit" => Some(Self::Debit),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

/// Input for registering an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Account number, unique within the entity (e.g. "1000").
    pub number: String,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// False for header / subtotal accounts.
    pub allow_posting: bool,
    /// True for fixed-asset accounts that need a periodic depreciation entry.
    pub requires_depreciation: bool,
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Account number.
    pub number: String,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Natural increasing side.
    pub normal_balance: NormalBalance,
    /// Whether journal lines may reference this account.
    pub allow_posting: bool,
    /// Whether a depreciation entry is expected every period.
    pub requires_depreciation: bool,
    /// Running balance, mutated only by posting.
    pub current_balance: Decimal,
    /// Optimistic concurrency token.
    pub version: i64,
}
