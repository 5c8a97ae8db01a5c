//! Exact probability arithmetic.
//!
//! Scores are products of many small factors, so they are kept as
//! arbitrary-precision rationals end to end. Binary floating point only
//! appears at the display/serialization boundary.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};

/// An exact score or probability.
pub type Probability = BigRational;

/// Exact `0`.
pub fn zero() -> Probability {
    Probability::zero()
}

/// Exact `1`.
pub fn one() -> Probability {
    Probability::one()
}

/// Exact `numer / denom`. `denom` must be non-zero.
pub fn ratio(numer: u64, denom: u64) -> Probability {
    Probability::new(BigInt::from(numer), BigInt::from(denom))
}

/// Exact integer value.
pub fn integer(value: u64) -> Probability {
    Probability::from_integer(BigInt::from(value))
}

/// Largest exponent magnitude [`parse_decimal`] accepts.
pub const MAX_DECIMAL_EXPONENT: i32 = 1024;

/// Parse a plain decimal literal (`"0.4"`, `"-1.25"`, `"3"`) into an exact rational.
///
/// Exponent notation is accepted (`"1e-3"`) up to [`MAX_DECIMAL_EXPONENT`].
/// Returns `None` for anything else.
pub fn parse_decimal(text: &str) -> Option<Probability> {
    let text = text.trim();
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => (&text[..pos], text[pos + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };
    if exponent.unsigned_abs() > MAX_DECIMAL_EXPONENT.unsigned_abs() {
        return None;
    }
    let (negative, digits) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let all_digits = format!("{int_part}{frac_part}");
    let mut numer: BigInt = all_digits.parse().ok()?;
    if negative {
        numer = -numer;
    }
    let scale = exponent.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
    let ten = BigInt::from(10u32);
    let value = if scale >= 0 {
        Probability::from_integer(numer * num_traits::pow(ten, scale.unsigned_abs() as usize))
    } else {
        Probability::new(numer, num_traits::pow(ten, scale.unsigned_abs() as usize))
    };
    Some(value)
}

/// Convert a configuration float into the exact rational of its shortest
/// decimal representation, so `0.1` becomes exactly `1/10`.
pub fn from_f64(value: f64) -> Option<Probability> {
    if !value.is_finite() {
        return None;
    }
    parse_decimal(&format!("{value}"))
}

/// Lossy conversion for display and JSON output.
pub fn to_f64(value: &Probability) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// serde `serialize_with` helper writing a probability as a JSON number.
pub fn serialize_f64<S: serde::Serializer>(value: &Probability, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(to_f64(value))
}

/// Format with a fixed number of decimal places, rounding half away from zero.
///
/// Used for log lines and CLI output; mirrors quantizing a decimal.
pub fn format_fixed(value: &Probability, places: usize) -> String {
    let scale = num_traits::pow(BigInt::from(10u32), places);
    let scaled = value * Probability::from_integer(scale);
    let rounded = scaled.round().to_integer();
    let negative = rounded < BigInt::zero();
    let digits = if negative { -rounded } else { rounded }.to_string();
    let digits = format!("{digits:0>width$}", width = places + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - places);
    let sign = if negative { "-" } else { "" };
    if places == 0 {
        format!("{sign}{int_part}")
    } else {
        format!("{sign}{int_part}.{frac_part}")
    }
}
