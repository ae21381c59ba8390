//! Header matching and cell comparison.

use rust_decimal::Decimal;

use crate::numeric::{compare_magnitude, parse_interval};

/// Headers compare trimmed and case-folded.
pub fn normalize_header(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn find_header(labels: &[String], needle: &str) -> Option<usize> {
    let needle = normalize_header(needle);
    labels.iter().position(|l| normalize_header(l) == needle)
}

/// `"Pose-2"` → `Some("Pose")`: the suffix repeated sections append to copied ids.
pub fn strip_copy_suffix(text: &str) -> Option<&str> {
    let (head, tail) = text.rsplit_once('-')?;
    if !head.is_empty() && !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
        Some(head)
    } else {
        None
    }
}

/// Apply a table operator to a cell and a target.
///
/// `equals`/`notEquals` and `contains`/`notContains` compare text; the
/// inequalities compare numerically and fail on non-numbers. Unknown
/// operators never match.
pub fn compare_cell(op: &str, cell: &str, target: &str) -> bool {
    match op {
        "equals" | "==" => cell == target,
        "notEquals" | "!=" => cell != target,
        "greaterThan" | ">" => compare_magnitude(cell, target, ">"),
        "greaterOrEqual" | ">=" => compare_magnitude(cell, target, ">="),
        "lessThan" | "<" => compare_magnitude(cell, target, "<"),
        "lessOrEqual" | "<=" => compare_magnitude(cell, target, "<="),
        "contains" => cell.contains(target),
        "notContains" => !cell.contains(target),
        _ => false,
    }
}

/// Closest header to `target` among `allowed` indices (all when `None`).
///
/// Order: normalized text equality, then the first header whose numeric
/// reading (a number or a `lo-hi` range) contains the target, then the
/// header with the smallest lower bound above the target, then the one
/// with the largest upper bound below it.
pub fn nearest_match(target: &str, labels: &[String], allowed: Option<&[usize]>) -> Option<usize> {
    let all: Vec<usize>;
    let indices = match allowed {
        Some(indices) => indices,
        None => {
            all = (0..labels.len()).collect();
            &all
        }
    };

    let wanted = normalize_header(target);
    if let Some(&i) = indices
        .iter()
        .find(|&&i| labels.get(i).is_some_and(|l| normalize_header(l) == wanted))
    {
        return Some(i);
    }

    let number = match parse_interval(target) {
        Some((lo, hi)) if lo == hi => lo,
        _ => return None,
    };

    let mut upper: Option<(Decimal, usize)> = None;
    let mut lower: Option<(Decimal, usize)> = None;
    for &i in indices {
        let Some((lo, hi)) = labels.get(i).and_then(|l| parse_interval(l)) else {
            continue;
        };
        if lo <= number && number <= hi {
            return Some(i);
        }
        if lo >= number && upper.map_or(true, |(best, _)| lo < best) {
            upper = Some((lo, i));
        }
        if hi <= number && lower.map_or(true, |(best, _)| hi > best) {
            lower = Some((hi, i));
        }
    }
    upper.or(lower).map(|(_, i)| i)
}
