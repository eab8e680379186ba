use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A monetary amount, currency-agnostic, rounded to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(Decimal);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("unparsable amount: {0:?}")]
    Unparsable(String),
    #[error("amount must be positive: {0:?}")]
    NotPositive(String),
}

impl Amount {
    pub fn from_decimal(decimal: Decimal) -> Self {
        Amount(decimal.round_dp(2))
    }

    pub fn from_cents(cents: i64) -> Self {
        Amount(Decimal::from(cents) / Decimal::from(100))
    }

    /// Parse a captured amount string: thousands separators and stray
    /// currency glyphs are stripped, everything else must parse as a decimal.
    /// Alert amounts are always positive; anything else is rejected, not
    /// guessed at.
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ',' | '₹' | '$' | ' '))
            .collect();
        let dec =
            Decimal::from_str(&cleaned).map_err(|_| AmountError::Unparsable(raw.to_string()))?;
        if dec <= Decimal::ZERO {
            return Err(AmountError::NotPositive(raw.to_string()));
        }
        Ok(Amount(dec.round_dp(2)))
    }

    pub fn to_decimal(self) -> Decimal {
        self.0
    }

    /// Whole cents, or `None` when the value does not fit an i64.
    pub fn to_cents(self) -> Option<i64> {
        self.0.checked_mul(Decimal::from(100))?.round().to_i64()
    }

    pub fn zero() -> Self {
        Amount(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain() {
        assert_eq!(Amount::parse("149.00").unwrap().to_cents(), Some(14900));
    }

    #[test]
    fn parse_with_thousands_separators() {
        assert_eq!(Amount::parse("30,000.00").unwrap().to_cents(), Some(3000000));
        assert_eq!(Amount::parse("1,98,322.31").unwrap().to_cents(), Some(19832231));
    }

    #[test]
    fn separator_strip_matches_comma_stripped_parse() {
        // The separator-stripped parse and the direct parse agree.
        let a = Amount::parse("30,000.00").unwrap();
        let b = Amount::parse("30000.00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_decimal(), Decimal::from(30000));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            Amount::parse("not-a-number"),
            Err(AmountError::Unparsable(_))
        ));
        assert!(matches!(Amount::parse(""), Err(AmountError::Unparsable(_))));
        assert!(matches!(
            Amount::parse("12..34"),
            Err(AmountError::Unparsable(_))
        ));
    }

    #[test]
    fn parse_rejects_zero_and_negative() {
        assert!(matches!(
            Amount::parse("0.00"),
            Err(AmountError::NotPositive(_))
        ));
        assert!(matches!(
            Amount::parse("-5.00"),
            Err(AmountError::NotPositive(_))
        ));
    }

    #[test]
    fn display_two_decimals() {
        assert_eq!(Amount::parse("1,250.5").unwrap().to_string(), "1250.50");
    }

    #[test]
    fn cents_round_trip() {
        let a = Amount::from_cents(14900);
        assert_eq!(a.to_cents(), Some(14900));
        assert_eq!(a.to_string(), "149.00");
    }

    #[test]
    fn out_of_range_cents_is_none() {
        let a = Amount::from_decimal(Decimal::MAX);
        assert_eq!(a.to_cents(), None);
    }
}
