//! Decimal input parsing
//!
//! Input is read with invariant rules: `.` is the decimal point, and a `,`
//! typed on a European keypad is taken to mean the same thing.

use crate::error::CalcError;
use crate::Result;
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn parse_decimal(input: &str) -> Result<Decimal> {
    let normalized = input.trim().replace(',', ".");
    let unsigned = normalized.strip_prefix(&['+', '-'][..]).unwrap_or(&normalized);

    let well_formed = !unsigned.is_empty()
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.chars().filter(|c| *c == '.').count() <= 1
        && unsigned.chars().any(|c| c.is_ascii_digit());

    if !well_formed {
        return Err(CalcError::InvalidInput(input.trim().to_string()));
    }

    let digits = unsigned.trim_end_matches('.');
    let digits = if digits.starts_with('.') {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };

    let magnitude = Decimal::from_str(&digits)
        .map_err(|_| CalcError::InvalidInput(input.trim().to_string()))?;

    if normalized.starts_with('-') {
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}
