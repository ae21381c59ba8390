//! Decimal parsing, rendering and comparison.
//!
//! Every arithmetic and magnitude comparison in the interpreter goes
//! through `rust_decimal::Decimal`. No `f64` anywhere in the evaluation
//! path.

use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Parse user-entered text as a number.
///
/// Surrounding and inner whitespace is ignored and `,` reads as the
/// decimal separator, so `" 1 250,5 "` parses as `1250.5`.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned)
        .ok()
        .or_else(|| Decimal::from_scientific(cleaned).ok())
}

/// Parse as a number, defaulting to zero.
pub fn to_number(text: &str) -> Decimal {
    parse_decimal(text).unwrap_or(Decimal::ZERO)
}

/// Render a number in normalized form: `7`, not `7.00`; never `-0`.
pub fn format_decimal(value: Decimal) -> String {
    let normalized = value.normalize();
    if normalized.is_zero() {
        "0".to_string()
    } else {
        normalized.to_string()
    }
}

/// Round to `digits` decimal places (clamped to 0..=12) using the given strategy.
pub fn round_to(value: Decimal, digits: Decimal, strategy: RoundingStrategy) -> Decimal {
    let dp = digits
        .trunc()
        .clamp(Decimal::ZERO, Decimal::from(12))
        .to_u32()
        .unwrap_or(0);
    value.round_dp_with_strategy(dp, strategy)
}

/// Numeric ordering of two texts; `None` when either side is not a number.
pub fn numeric_cmp(left: &str, right: &str) -> Option<Ordering> {
    let l = parse_decimal(left)?;
    let r = parse_decimal(right)?;
    Some(l.cmp(&r))
}

/// Apply a magnitude operator (`>`, `>=`, `<`, `<=`) to two texts.
///
/// Non-numeric operands never satisfy the comparison.
pub fn compare_magnitude(left: &str, right: &str, op: &str) -> bool {
    match (numeric_cmp(left, right), op) {
        (Some(o), ">") => o == Ordering::Greater,
        (Some(o), ">=") => o != Ordering::Less,
        (Some(o), "<") => o == Ordering::Less,
        (Some(o), "<=") => o != Ordering::Greater,
        _ => false,
    }
}

/// Numeric reading of a header label: a plain number `n` is `[n, n]`, a
/// range `lo-hi` is `[lo, hi]`. A leading currency symbol and a trailing
/// unit or currency suffix are ignored; any other letter (as in `R3-X3`)
/// makes the label non-numeric.
pub fn parse_interval(label: &str) -> Option<(Decimal, Decimal)> {
    let core = label
        .trim()
        .trim_start_matches(|c: char| {
            !c.is_alphanumeric() && !c.is_whitespace() && !matches!(c, '+' | '-' | '.' | ',')
        })
        .trim_end_matches(|c: char| !c.is_ascii_digit());
    if !core
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '+' | '-' | '.' | ','))
    {
        return None;
    }
    let sanitized: String = core
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if sanitized.is_empty() {
        return None;
    }
    if let Some(n) = parse_decimal(&sanitized) {
        return Some((n, n));
    }
    // Split on the first '-' that is not a leading sign.
    let split = sanitized
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-')
        .map(|(i, _)| i)?;
    let lo = parse_decimal(&sanitized[..split])?;
    let hi = parse_decimal(&sanitized[split + 1..])?;
    Some((lo.min(hi), lo.max(hi)))
}
