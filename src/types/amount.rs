//! LEARN token amounts with safe arithmetic.
//!
//! Uses 18 decimal places for precision.
//! All arithmetic is checked; callers turn overflow into an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places (10^18 units = 1 LEARN)
pub const DECIMALS: u32 = 18;

/// One LEARN in base units
pub const ONE_TOKEN: u128 = 10_u128.pow(DECIMALS);

/// Denominator for basis-point multipliers
pub const BASIS_POINTS: u128 = 10_000;

/// A token amount in the smallest unit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create from raw base units
    #[must_use]
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole tokens (multiplied by 10^18)
    #[must_use]
    pub const fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * ONE_TOKEN)
    }

    /// Parse a decimal string such as `"1.5"`
    ///
    /// # Errors
    /// Returns error if the string format is invalid or overflows
    pub fn from_decimal_str(s: &str) -> Result<Self, AmountError> {
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (s, None),
        };

        let whole: u128 = whole.parse().map_err(|_| AmountError::InvalidFormat)?;

        let fractional = match frac {
            Some(f) if f.len() > DECIMALS as usize => return Err(AmountError::TooManyDecimals),
            Some(f) if f.is_empty() => 0,
            Some(f) => format!("{f:0<width$}", width = DECIMALS as usize)
                .parse::<u128>()
                .map_err(|_| AmountError::InvalidFormat)?,
            None => 0,
        };

        whole
            .checked_mul(ONE_TOKEN)
            .and_then(|w| w.checked_add(fractional))
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Get the raw base unit value
    #[must_use]
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Get the whole-token part (truncated)
    #[must_use]
    pub const fn whole_tokens(&self) -> u128 {
        self.0 / ONE_TOKEN
    }

    /// Convert to a decimal string representation
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / ONE_TOKEN;
        let frac = self.0 % ONE_TOKEN;

        if frac == 0 {
            format!("{whole}.0")
        } else {
            let frac_str = format!("{frac:018}");
            format!("{whole}.{}", frac_str.trim_end_matches('0'))
        }
    }

    /// Checked addition
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// `self * bps / 10_000`, `None` on overflow
    #[must_use]
    pub fn apply_basis_points(self, bps: u32) -> Option<Self> {
        self.0
            .checked_mul(u128::from(bps))
            .map(|scaled| Self(scaled / BASIS_POINTS))
    }

    /// Saturating subtraction (floors at 0)
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Check if amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({})", self.to_decimal_string())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} LEARN", self.to_decimal_string())
    }
}

/// Amount parsing/arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Invalid number format
    #[error("invalid amount format")]
    InvalidFormat,
    /// Too many decimal places
    #[error("too many decimal places (max {DECIMALS})")]
    TooManyDecimals,
    /// Arithmetic overflow
    #[error("amount overflow")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tokens() {
        let amount = TokenAmount::from_tokens(100);
        assert_eq!(amount.whole_tokens(), 100);
        assert_eq!(amount.raw(), 100 * ONE_TOKEN);
    }

    #[test]
    fn test_from_decimal_str() {
        let amount = TokenAmount::from_decimal_str("1.5").unwrap();
        assert_eq!(amount.raw(), ONE_TOKEN + ONE_TOKEN / 2);

        let amount = TokenAmount::from_decimal_str("0.001").unwrap();
        assert_eq!(amount.raw(), ONE_TOKEN / 1000);

        assert_eq!(
            TokenAmount::from_decimal_str("1.0000000000000000001"),
            Err(AmountError::TooManyDecimals)
        );
        assert_eq!(
            TokenAmount::from_decimal_str("abc"),
            Err(AmountError::InvalidFormat)
        );
    }

    #[test]
    fn test_to_decimal_string() {
        assert_eq!(TokenAmount::from_tokens(100).to_decimal_string(), "100.0");
        assert_eq!(
            TokenAmount::from_raw(ONE_TOKEN + ONE_TOKEN / 2).to_decimal_string(),
            "1.5"
        );
    }

    #[test]
    fn test_basis_points() {
        let base = TokenAmount::from_tokens(100);
        assert_eq!(base.apply_basis_points(10_000), Some(base));
        assert_eq!(
            base.apply_basis_points(15_000),
            Some(TokenAmount::from_tokens(150))
        );
        assert_eq!(
            base.apply_basis_points(5_000),
            Some(TokenAmount::from_tokens(50))
        );
        assert_eq!(TokenAmount::from_raw(u128::MAX).apply_basis_points(2), None);
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = TokenAmount::from_tokens(100);
        let b = TokenAmount::from_tokens(200);

        assert!(a.checked_sub(b).is_none());
        assert_eq!(a.checked_add(b), Some(TokenAmount::from_tokens(300)));
        assert_eq!(a.saturating_sub(b), TokenAmount::ZERO);
    }
}
