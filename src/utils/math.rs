//! Fixed-point arithmetic and checked math helpers.
//!
//! Every operation here fails instead of wrapping. Products of two 18-decimal
//! quantities exceed `u128` quickly (10 units at $2000 is already 2e40 before
//! rescaling), so `mul_div` widens to 256 bits for the intermediate product.

use ethereum_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::{PRECISION, TOKEN_DECIMALS};

// ═══════════════════════════════════════════════════════════════════════════════
// CHECKED ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Checked addition
pub fn safe_add(a: u128, b: u128, operation: &str) -> Result<u128> {
    a.checked_add(b).ok_or_else(|| Error::Overflow {
        operation: operation.to_string(),
    })
}

/// Checked subtraction
pub fn safe_sub(a: u128, b: u128, operation: &str) -> Result<u128> {
    a.checked_sub(b).ok_or_else(|| Error::Underflow {
        operation: operation.to_string(),
    })
}

/// Computes `(a * b) / c`, truncating, with a 256-bit intermediate product.
pub fn mul_div(a: u128, b: u128, c: u128, operation: &str) -> Result<u128> {
    if c == 0 {
        return Err(Error::DivisionByZero {
            operation: operation.to_string(),
        });
    }

    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or_else(|| Error::Overflow {
            operation: operation.to_string(),
        })?;
    let quotient = product / U256::from(c);

    if quotient > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: operation.to_string(),
        });
    }

    Ok(quotient.low_u128())
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Unsigned fixed-point number with 18 decimals.
///
/// Used for normalized prices, USD values and health factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Wad(u128);

impl Wad {
    /// Scale factor: 10^18
    pub const SCALE: u128 = PRECISION;

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(PRECISION);

    /// Largest representable value, reported as the health factor of a debt-free account
    pub const MAX: Self = Self(u128::MAX);

    /// Create from a raw 18-decimal value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Raw 18-decimal value
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Create from a whole number of units
    pub fn from_integer(value: u128) -> Result<Self> {
        value
            .checked_mul(Self::SCALE)
            .map(Self)
            .ok_or_else(|| Error::Overflow {
                operation: "wad from integer".into(),
            })
    }

    /// Parse a human decimal such as `"2000"` or `"0.05"`.
    pub fn from_decimal_str(s: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidParameter {
            name: "amount".into(),
            reason,
        };

        let decimal = Decimal::from_str(s.trim()).map_err(|e| invalid(e.to_string()))?;
        if decimal.is_sign_negative() {
            return Err(invalid(format!("{} is negative", s)));
        }

        let scale = decimal.scale();
        if scale > TOKEN_DECIMALS as u32 {
            return Err(invalid(format!("{} has more than {} decimals", s, TOKEN_DECIMALS)));
        }

        let mantissa = decimal.mantissa().unsigned_abs();
        let factor = 10u128.pow(TOKEN_DECIMALS as u32 - scale);
        mantissa
            .checked_mul(factor)
            .map(Self)
            .ok_or_else(|| Error::Overflow {
                operation: format!("parse {}", s),
            })
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        safe_add(self.0, rhs.0, "wad add").map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, rhs: Self) -> Result<Self> {
        safe_sub(self.0, rhs.0, "wad sub").map(Self)
    }

    /// Fixed-point multiplication, truncating
    pub fn checked_mul(self, rhs: Self) -> Result<Self> {
        mul_div(self.0, rhs.0, Self::SCALE, "wad mul").map(Self)
    }

    /// Fixed-point division, truncating
    pub fn checked_div(self, rhs: Self) -> Result<Self> {
        mul_div(self.0, Self::SCALE, rhs.0, "wad div").map(Self)
    }

    /// Scale by `numerator / denominator`, truncating
    pub fn mul_ratio(self, numerator: u128, denominator: u128) -> Result<Self> {
        mul_div(self.0, numerator, denominator, "wad ratio").map(Self)
    }

    /// Whole units, truncated
    pub fn trunc(&self) -> u128 {
        self.0 / Self::SCALE
    }

    /// Format with all 18 decimals, trailing zeros trimmed
    pub fn to_decimal_string(&self) -> String {
        if *self == Self::MAX {
            return "inf".to_string();
        }
        let whole = self.0 / Self::SCALE;
        let frac = self.0 % Self::SCALE;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:018}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl From<Wad> for u128 {
    fn from(value: Wad) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wad_basic() {
        let one = Wad::ONE;
        let two = Wad::from_integer(2).unwrap();

        assert_eq!(one.checked_add(one).unwrap(), two);
        assert_eq!(two.checked_sub(one).unwrap(), one);
        assert_eq!(one.checked_mul(two).unwrap(), two);
        assert_eq!(two.checked_div(one).unwrap(), two);
    }

    #[test]
    fn test_wad_never_wraps() {
        assert!(Wad::ZERO.checked_sub(Wad::ONE).is_err());
        assert!(Wad::MAX.checked_add(Wad::from_raw(1)).is_err());
        assert!(Wad::MAX.checked_mul(Wad::from_integer(2).unwrap()).is_err());
        assert!(Wad::ONE.checked_div(Wad::ZERO).is_err());
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 2000e18 * 10e18 overflows u128 before the division
        let price = 2_000 * PRECISION;
        let amount = 10 * PRECISION;
        let value = mul_div(price, amount, PRECISION, "usd value").unwrap();
        assert_eq!(value, 20_000 * PRECISION);
    }

    #[test]
    fn test_mul_div_errors() {
        assert!(matches!(
            mul_div(1, 1, 0, "x"),
            Err(Error::DivisionByZero { .. })
        ));
        assert!(matches!(
            mul_div(u128::MAX, u128::MAX, 1, "x"),
            Err(Error::Overflow { .. })
        ));
    }

    #[test]
    fn test_from_decimal_str() {
        assert_eq!(Wad::from_decimal_str("2000").unwrap(), Wad::from_integer(2000).unwrap());
        assert_eq!(Wad::from_decimal_str("0.5").unwrap(), Wad::from_raw(PRECISION / 2));
        assert_eq!(Wad::from_decimal_str("0.000000000000000001").unwrap(), Wad::from_raw(1));
        assert!(Wad::from_decimal_str("-1").is_err());
        assert!(Wad::from_decimal_str("abc").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Wad::from_integer(100).unwrap().to_string(), "100");
        assert_eq!(Wad::from_raw(1_500_000_000_000_000_000).to_string(), "1.5");
        assert_eq!(Wad::MAX.to_string(), "inf");
    }
}
