//! Authenticated principal identifiers.
//!
//! Authentication happens outside the ledger. Callers hand the core an
//! identifier string (usually an email) for the authenticated user, and the
//! core only ever compares principals with each other.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a principal identifier is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    /// The identifier is empty after trimming.
    #[error("Principal identifier cannot be empty")]
    Empty,
}

/// An authenticated principal (user) identifier.
///
/// Identifiers are normalized to trimmed lower case so that two spellings of
/// the same email never count as two distinct approvers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    /// Creates a principal from a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns `PrincipalError::Empty` if the identifier is blank.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, PrincipalError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(PrincipalError::Empty);
        }
        Ok(Self(normalized))
    }

    /// Returns the normalized identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Principal {
    type Error = PrincipalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Principal> for String {
    fn from(value: Principal) -> Self {
        value.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
