//! Decimal string <-> integer base-unit conversion for ERC-20 amounts.
//!
//! `parse_units("1.5", 18)` yields `1_500_000_000_000_000_000`. Fractions longer
//! than `decimals` are rounded half-up on the first dropped digit, which is how
//! wallets and frontends compute the amount they ask the user to sign.

use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("negative amounts are not supported")]
    Negative,

    #[error("invalid character '{0}' in amount")]
    InvalidCharacter(char),

    #[error("amount has more than one decimal point")]
    MultipleDecimalPoints,

    #[error("amount does not fit in 256 bits")]
    Overflow,
}

fn ten_pow(decimals: u8) -> Result<U256, UnitsError> {
    U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .ok_or(UnitsError::Overflow)
}

fn push_digit(value: U256, digit: u32) -> Result<U256, UnitsError> {
    value
        .checked_mul(U256::from(10u8))
        .and_then(|v| v.checked_add(U256::from(digit)))
        .ok_or(UnitsError::Overflow)
}

fn digit_of(c: char) -> Result<u32, UnitsError> {
    c.to_digit(10).ok_or(UnitsError::InvalidCharacter(c))
}

/// Convert a human readable decimal amount into token base units.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, UnitsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UnitsError::Empty);
    }
    if value.starts_with('-') {
        return Err(UnitsError::Negative);
    }

    let mut parts = value.split('.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(UnitsError::MultipleDecimalPoints);
    }
    if integer.is_empty() && fraction.is_empty() {
        return Err(UnitsError::Empty);
    }

    let mut result = U256::ZERO;
    for c in integer.chars() {
        result = push_digit(result, digit_of(c)?)?;
    }

    let decimals_len = decimals as usize;
    let mut kept = 0usize;
    let mut round_up = false;
    for (i, c) in fraction.chars().enumerate() {
        let digit = digit_of(c)?;
        if i < decimals_len {
            result = push_digit(result, digit)?;
            kept += 1;
        } else if i == decimals_len {
            round_up = digit >= 5;
        }
    }

    // Pad the fraction out to `decimals` places
    for _ in kept..decimals_len {
        result = push_digit(result, 0)?;
    }

    if round_up {
        result = result.checked_add(U256::ONE).ok_or(UnitsError::Overflow)?;
    }

    Ok(result)
}

/// Render base units as a decimal string without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let Ok(scale) = ten_pow(decimals) else {
        return "0".to_string();
    };

    let integer = value / scale;
    let fraction = value % scale;
    if fraction.is_zero() {
        return integer.to_string();
    }

    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", integer, fraction.trim_end_matches('0'))
}

/// Lossy conversion of base units into a float, for USD display maths.
pub fn to_f64(value: U256, decimals: u8) -> f64 {
    format_units(value, decimals).parse().unwrap_or(0.0)
}

/// Scale factor for 18-decimal oracle prices
pub const WAD: f64 = 1e18;

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(s: &str) -> U256 {
        U256::from_str_radix(s, 10).unwrap()
    }

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_units("100", 18).unwrap(), wei("100000000000000000000"));
        assert_eq!(parse_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(parse_units(".25", 2).unwrap(), U256::from(25u64));
        assert_eq!(parse_units("3.", 2).unwrap(), U256::from(300u64));
        assert_eq!(parse_units("0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_parse_rounds_excess_precision() {
        assert_eq!(parse_units("1.234", 2).unwrap(), U256::from(123u64));
        assert_eq!(parse_units("1.235", 2).unwrap(), U256::from(124u64));
        assert_eq!(parse_units("0.999", 2).unwrap(), U256::from(100u64));
        assert_eq!(parse_units("7.9", 0).unwrap(), U256::from(8u64));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_units("", 18), Err(UnitsError::Empty));
        assert_eq!(parse_units("  ", 18), Err(UnitsError::Empty));
        assert_eq!(parse_units(".", 18), Err(UnitsError::Empty));
        assert_eq!(parse_units("-1", 18), Err(UnitsError::Negative));
        assert_eq!(parse_units("1.2.3", 18), Err(UnitsError::MultipleDecimalPoints));
        assert_eq!(parse_units("12a", 18), Err(UnitsError::InvalidCharacter('a')));
        assert_eq!(parse_units("1e18", 18), Err(UnitsError::InvalidCharacter('e')));
    }

    #[test]
    fn test_parse_overflow() {
        let huge = "1".repeat(80);
        assert_eq!(parse_units(&huge, 18), Err(UnitsError::Overflow));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(wei("1500000000000000000"), 18), "1.5");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::from(42_000u64), 3), "42");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(to_f64(wei("2500000000000000000"), 18), 2.5);
    }
}
