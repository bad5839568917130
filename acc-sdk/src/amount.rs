//! Fixed-point currency amounts.
//!
//! Every amount that crosses the wire is an integer scaled by `10^decimals`.
//! [`Amount`] keeps the scaled integer together with its scale so that the
//! conversion from a human literal (`"1,234.5"`) and back is explicit.
//!
//! Parsing never rounds: excess fractional digits are dropped and missing
//! ones are padded with zeros.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use alloy_primitives::U256;

use crate::error::EncodingError;

/// Largest scale whose factor `10^decimals` still fits in 256 bits.
pub const MAX_DECIMALS: u8 = 77;

/// Scale used by points and tokens on the ledger.
pub const DEFAULT_DECIMALS: u8 = 18;

const GWEI: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

/// An integer value carrying an explicit decimal scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Amount {
    value: U256,
    decimals: u8,
}

impl Amount {
    /// Wraps an already scaled integer.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::InvalidDecimals`] if `decimals` exceeds [`MAX_DECIMALS`].
    pub fn new(value: U256, decimals: u8) -> Result<Self, EncodingError> {
        if decimals > MAX_DECIMALS {
            return Err(EncodingError::InvalidDecimals(decimals));
        }
        Ok(Self { value, decimals })
    }

    /// Zero at the given scale.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::InvalidDecimals`] if `decimals` exceeds [`MAX_DECIMALS`].
    pub fn zero(decimals: u8) -> Result<Self, EncodingError> {
        Self::new(U256::ZERO, decimals)
    }

    /// Parses a decimal literal such as `"1,000.25"` at the given scale.
    ///
    /// `,` and `_` are accepted as digit-group separators. An empty literal is
    /// zero. The fractional part is truncated or zero-padded to `decimals` digits.
    ///
    /// # Errors
    ///
    /// - [`EncodingError::InvalidFormat`] for more than one `.` or any non-digit character
    /// - [`EncodingError::InvalidDecimals`] if `decimals` exceeds [`MAX_DECIMALS`]
    /// - [`EncodingError::Overflow`] if the scaled value exceeds 256 bits
    pub fn make(literal: &str, decimals: u8) -> Result<Self, EncodingError> {
        let factor = scale_factor(decimals)?;
        let cleaned: String = literal
            .trim()
            .chars()
            .filter(|c| !matches!(c, ',' | '_'))
            .collect();
        if cleaned.is_empty() {
            return Self::zero(decimals);
        }

        let (whole, fraction) = cleaned.split_once('.').unwrap_or((&cleaned, ""));
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if fraction.contains('.')
            || !all_digits(whole)
            || !all_digits(fraction)
            || (whole.is_empty() && fraction.is_empty())
        {
            return Err(EncodingError::InvalidFormat(literal.to_owned()));
        }

        let width = usize::from(decimals);
        let fraction: String = fraction.chars().take(width).collect();
        let fraction = format!("{fraction:0<width$}");

        let overflow = || EncodingError::Overflow(literal.to_owned());
        let whole = parse_digits(whole).ok_or_else(overflow)?;
        let fraction = parse_digits(&fraction).ok_or_else(overflow)?;
        let value = whole
            .checked_mul(factor)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(overflow)?;
        Ok(Self { value, decimals })
    }

    /// The scaled integer.
    #[must_use]
    pub const fn value(&self) -> U256 {
        self.value
    }

    /// The decimal scale.
    #[must_use]
    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Renders the amount as `whole.fraction` with exactly `decimals` fractional digits.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        let (whole, remainder) = self.split();
        if self.decimals == 0 {
            return whole.to_string();
        }
        let width = usize::from(self.decimals);
        format!("{whole}.{:0>width$}", remainder.to_string())
    }

    /// Renders the amount for display: trailing fractional zeros are trimmed,
    /// the fraction is cut to `precision` digits when given, and the whole part
    /// is grouped by thousands when `comma` is set.
    #[must_use]
    pub fn to_display_string(&self, comma: bool, precision: Option<usize>) -> String {
        let (whole, remainder) = self.split();
        let whole = if comma {
            group_thousands(&whole.to_string())
        } else {
            whole.to_string()
        };
        if remainder.is_zero() {
            return whole;
        }
        let width = usize::from(self.decimals);
        let mut fraction = format!("{:0>width$}", remainder.to_string());
        if let Some(precision) = precision {
            fraction.truncate(precision);
        }
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            whole
        } else {
            format!("{whole}.{fraction}")
        }
    }

    /// Rescales to `decimals`, multiplying when the scale grows and
    /// truncating when it shrinks.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::InvalidDecimals`] or [`EncodingError::Overflow`]
    /// if the new scale or value cannot be represented.
    pub fn convert(&self, decimals: u8) -> Result<Self, EncodingError> {
        scale_factor(decimals)?;
        let value = if decimals >= self.decimals {
            let factor = scale_factor(decimals - self.decimals)?;
            self.value
                .checked_mul(factor)
                .ok_or_else(|| EncodingError::Overflow(self.value.to_string()))?
        } else {
            self.value / scale_factor(self.decimals - decimals)?
        };
        Ok(Self { value, decimals })
    }

    /// Same amount with the low nine digits of the scaled value cleared.
    #[must_use]
    pub fn zero_gwei(&self) -> Self {
        Self {
            value: zero_gwei(self.value),
            decimals: self.decimals,
        }
    }

    fn split(&self) -> (U256, U256) {
        // decimals was checked against MAX_DECIMALS on construction
        let factor = U256::from(10u8).pow(U256::from(self.decimals));
        self.value.div_rem(factor)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Parses a literal at [`DEFAULT_DECIMALS`].
impl FromStr for Amount {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::make(s, DEFAULT_DECIMALS)
    }
}

impl From<Amount> for U256 {
    fn from(value: Amount) -> Self {
        value.value
    }
}

/// Truncates a base-unit value to a whole multiple of `10^9`.
///
/// Refunds, withdrawals and loyalty amounts are always submitted in this form.
#[must_use]
pub fn zero_gwei(value: U256) -> U256 {
    (value / GWEI) * GWEI
}

fn scale_factor(decimals: u8) -> Result<U256, EncodingError> {
    if decimals > MAX_DECIMALS {
        return Err(EncodingError::InvalidDecimals(decimals));
    }
    Ok(U256::from(10u8).pow(U256::from(decimals)))
}

fn parse_digits(digits: &str) -> Option<U256> {
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).ok()
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
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
    fn make_scales_whole_and_fraction() {
        let amount = Amount::make("1.5", 18).unwrap();
        assert_eq!(amount.value(), U256::from(1_500_000_000_000_000_000u128));
    }

    #[test]
    fn make_strips_separators() {
        let amount = Amount::make("1,000_000.25", 2).unwrap();
        assert_eq!(amount.value(), U256::from(100_000_025u64));
    }

    #[test]
    fn make_empty_is_zero() {
        assert_eq!(Amount::make("", 18).unwrap().value(), U256::ZERO);
    }

    #[test]
    fn make_truncates_instead_of_rounding() {
        let amount = Amount::make("1.23456789", 4).unwrap();
        assert_eq!(amount.to_decimal_string(), "1.2345");
        let amount = Amount::make("0.99999", 2).unwrap();
        assert_eq!(amount.to_decimal_string(), "0.99");
    }

    #[test]
    fn make_rejects_malformed_literals() {
        for literal in ["1.2.3", "12a", "-1", ".", "1 000"] {
            assert!(
                matches!(
                    Amount::make(literal, 18),
                    Err(EncodingError::InvalidFormat(_))
                ),
                "{literal} should be rejected"
            );
        }
    }

    #[test]
    fn make_rejects_oversized_scale() {
        assert_eq!(
            Amount::make("1", 78),
            Err(EncodingError::InvalidDecimals(78))
        );
    }

    #[test]
    fn make_detects_overflow() {
        let literal = "9".repeat(70);
        assert!(matches!(
            Amount::make(&literal, 18),
            Err(EncodingError::Overflow(_))
        ));
    }

    #[test]
    fn decimal_string_pads_fraction() {
        for (literal, expected) in [
            ("1", "1.0000"),
            ("0.5", "0.5000"),
            ("12.0001", "12.0001"),
            (".25", "0.2500"),
        ] {
            assert_eq!(Amount::make(literal, 4).unwrap().to_decimal_string(), expected);
        }
    }

    #[test]
    fn decimal_string_without_scale() {
        assert_eq!(Amount::make("42.9", 0).unwrap().to_decimal_string(), "42");
    }

    #[test]
    fn display_string_trims_zeros() {
        let amount = Amount::make("1234567.5000", 18).unwrap();
        assert_eq!(amount.to_display_string(false, None), "1234567.5");
        assert_eq!(amount.to_display_string(true, None), "1,234,567.5");
        assert_eq!(amount.to_display_string(true, Some(0)), "1,234,567");
        let whole = Amount::make("100", 18).unwrap();
        assert_eq!(whole.to_display_string(true, None), "100");
    }

    #[test]
    fn convert_rescales() {
        let amount = Amount::make("1.23456", 6).unwrap();
        let up = amount.convert(18).unwrap();
        assert_eq!(up.to_decimal_string(), "1.234560000000000000");
        let down = amount.convert(2).unwrap();
        assert_eq!(down.to_decimal_string(), "1.23");
    }

    #[test]
    fn zero_gwei_truncates_and_is_idempotent() {
        let value = U256::from(1_234_567_890_123u64);
        let once = zero_gwei(value);
        assert_eq!(once, U256::from(1_234_000_000_000u64));
        assert_eq!(zero_gwei(once), once);
        assert_eq!(zero_gwei(U256::from(999_999_999u64)), U256::ZERO);
    }

    #[test]
    fn from_str_uses_default_scale() {
        let amount: Amount = "2".parse().unwrap();
        assert_eq!(amount.decimals(), DEFAULT_DECIMALS);
        assert_eq!(amount.to_string(), "2000000000000000000");
    }
}
