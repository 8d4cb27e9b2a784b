//! Decimal money helpers.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` throughout; these helpers give the
//! ledger one place to define what "equal to the cent" means.

use rust_decimal::Decimal;

/// One cent, the smallest difference the ledger distinguishes.
pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Returns true if `a` and `b` differ by strictly less than `tolerance`.
#[must_use]
pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() < tolerance
}

/// Returns true if `a` and `b` are equal when rounded to the cent.
#[must_use]
pub fn equal_to_the_cent(a: Decimal, b: Decimal) -> bool {
    a.round_dp(2) == b.round_dp(2)
}
