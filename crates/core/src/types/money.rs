//! Currency amounts in integer minor units.
//!
//! All prices in the storefront are Thai baht. Amounts are stored as satang
//! (1/100 baht) so arithmetic is exact; [`Money::to_decimal`] converts to a
//! `rust_decimal::Decimal` for display.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of minor units (satang) per baht.
const MINOR_PER_MAJOR: i64 = 100;

/// A baht amount stored in satang.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero baht.
    pub const ZERO: Self = Self(0);

    /// Create an amount from satang.
    #[must_use]
    pub const fn from_minor(satang: i64) -> Self {
        Self(satang)
    }

    /// Create an amount from whole baht.
    #[must_use]
    pub const fn from_baht(baht: i64) -> Self {
        Self(baht.saturating_mul(MINOR_PER_MAJOR))
    }

    /// The amount in satang.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Add two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtract an amount, returning `None` on overflow.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Multiply by a whole count (e.g. months), returning `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, factor: u32) -> Option<Self> {
        match self.0.checked_mul(factor as i64) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Add two amounts, clamping at the numeric bounds.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Whether the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// The amount in baht as a two-place decimal.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl fmt::Display for Money {
    /// Formats as `฿1,500` or `฿1,500.50` (satang shown only when non-zero).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_major = MINOR_PER_MAJOR.unsigned_abs();
        let whole = (abs / per_major).to_string();
        let satang = abs % per_major;

        write!(f, "{sign}\u{0E3F}{}", group_thousands(&whole))?;
        if satang != 0 {
            write!(f, ".{satang:02}")?;
        }
        Ok(())
    }
}

/// Insert `,` separators every three digits.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baht_and_satang_agree() {
        assert_eq!(Money::from_baht(1500), Money::from_minor(150_000));
        assert_eq!(Money::from_baht(1500).minor_units(), 150_000);
    }

    #[test]
    fn display_groups_thousands() {
        assert_eq!(Money::from_baht(7500).to_string(), "\u{0E3F}7,500");
        assert_eq!(Money::from_baht(300).to_string(), "\u{0E3F}300");
        assert_eq!(Money::from_baht(1_234_567).to_string(), "\u{0E3F}1,234,567");
        assert_eq!(Money::from_minor(150_050).to_string(), "\u{0E3F}1,500.50");
        assert_eq!(Money::from_minor(105).to_string(), "\u{0E3F}1.05");
        assert_eq!(Money::from_baht(-20).to_string(), "-\u{0E3F}20");
    }

    #[test]
    fn checked_arithmetic_detects_overflow() {
        assert_eq!(
            Money::from_baht(1500).checked_mul(3),
            Some(Money::from_baht(4500))
        );
        assert_eq!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)), None);
        assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
        assert_eq!(
            Money::from_baht(4500).checked_sub(Money::from_baht(300)),
            Some(Money::from_baht(4200))
        );
    }

    #[test]
    fn decimal_conversion_keeps_two_places() {
        assert_eq!(Money::from_minor(150_050).to_decimal().to_string(), "1500.50");
    }
}
