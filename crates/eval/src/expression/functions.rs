//! Built-in expression functions, with their French aliases.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

use super::{EvalIssue, Operand};
use crate::numeric::round_to;

fn arg(args: &[Operand], i: usize) -> Decimal {
    args.get(i).map(Operand::to_number).unwrap_or(Decimal::ZERO)
}

fn bool_value(b: bool) -> Operand {
    Operand::Number(if b { Decimal::ONE } else { Decimal::ZERO })
}

fn divide(a: Decimal, b: Decimal) -> Option<Decimal> {
    if b.is_zero() {
        None
    } else {
        a.checked_div(b)
    }
}

/// `a ^ b`, shared by the operator and `power()`.
pub(super) fn power(base: Decimal, exponent: Decimal) -> Option<Decimal> {
    if exponent.fract().is_zero() {
        exponent.to_i64().and_then(|e| base.checked_powi(e))
    } else {
        base.checked_powd(exponent)
    }
}

/// Overflow-checked sum.
fn total(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.fold(Some(Decimal::ZERO), |acc, v| acc?.checked_add(v))
}

/// Round to a multiple (`ceil(x, m)` / `floor(x, m)`); a zero multiple
/// falls back to plain rounding. `None` on overflow.
fn round_to_multiple(
    x: Decimal,
    multiple: Option<Decimal>,
    strategy: RoundingStrategy,
) -> Option<Decimal> {
    match multiple.filter(|m| !m.is_zero()) {
        Some(m) => x
            .checked_div(m)?
            .round_dp_with_strategy(0, strategy)
            .checked_mul(m),
        None => Some(x.round_dp_with_strategy(0, strategy)),
    }
}

/// The number, or zero with an `InvalidResult` issue.
fn number_or_invalid(value: Option<Decimal>, issues: &mut Vec<EvalIssue>) -> Operand {
    match value {
        Some(v) => Operand::Number(v),
        None => {
            issues.push(EvalIssue::InvalidResult);
            Operand::Number(Decimal::ZERO)
        }
    }
}

/// Call a built-in. `None` means the function is unknown.
pub(super) fn call(name: &str, args: &[Operand], issues: &mut Vec<EvalIssue>) -> Option<Operand> {
    let numbers = || args.iter().map(Operand::to_number);

    let value = match name {
        "min" => Operand::Number(numbers().min().unwrap_or(Decimal::ZERO)),
        "max" => Operand::Number(numbers().max().unwrap_or(Decimal::ZERO)),
        "sum" | "somme" => number_or_invalid(total(numbers()), issues),
        "avg" | "average" | "moyenne" => match total(numbers()) {
            Some(sum) => {
                Operand::Number(divide(sum, Decimal::from(args.len())).unwrap_or(Decimal::ZERO))
            }
            None => number_or_invalid(None, issues),
        },
        "count" | "nb" => Operand::Number(Decimal::from(
            args.iter().filter(|a| a.is_present()).count(),
        )),
        "abs" => Operand::Number(arg(args, 0).abs()),
        "sign" | "signe" => {
            let x = arg(args, 0);
            Operand::Number(if x.is_zero() {
                Decimal::ZERO
            } else if x.is_sign_negative() {
                Decimal::NEGATIVE_ONE
            } else {
                Decimal::ONE
            })
        }
        "round" | "arrondi" => Operand::Number(round_to(
            arg(args, 0),
            arg(args, 1),
            RoundingStrategy::MidpointAwayFromZero,
        )),
        "roundup" => Operand::Number(round_to(
            arg(args, 0),
            arg(args, 1),
            RoundingStrategy::AwayFromZero,
        )),
        "rounddown" | "trunc" | "tronque" => {
            Operand::Number(round_to(arg(args, 0), arg(args, 1), RoundingStrategy::ToZero))
        }
        "int" | "ent" => Operand::Number(arg(args, 0).floor()),
        "ceil" | "ceiling" | "plafond" => number_or_invalid(
            round_to_multiple(
                arg(args, 0),
                args.get(1).map(Operand::to_number),
                RoundingStrategy::ToPositiveInfinity,
            ),
            issues,
        ),
        "floor" | "plancher" => number_or_invalid(
            round_to_multiple(
                arg(args, 0),
                args.get(1).map(Operand::to_number),
                RoundingStrategy::ToNegativeInfinity,
            ),
            issues,
        ),
        "mod" => {
            let divisor = arg(args, 1);
            Operand::Number(if divisor.is_zero() {
                Decimal::ZERO
            } else {
                arg(args, 0).checked_rem(divisor).unwrap_or(Decimal::ZERO)
            })
        }
        "power" | "puissance" => number_or_invalid(power(arg(args, 0), arg(args, 1)), issues),
        "sqrt" | "racine" => {
            let x = arg(args, 0);
            match x.sqrt() {
                Some(v) if !x.is_sign_negative() || x.is_zero() => Operand::Number(v),
                _ => {
                    issues.push(EvalIssue::InvalidResult);
                    Operand::Number(Decimal::ZERO)
                }
            }
        }
        "if" | "si" => {
            if args.len() < 2 {
                issues.push(EvalIssue::InvalidResult);
                Operand::Number(Decimal::ZERO)
            } else if args[0].is_truthy() {
                args[1].clone()
            } else {
                args.get(2).cloned().unwrap_or(Operand::Number(Decimal::ZERO))
            }
        }
        "and" | "et" => bool_value(!args.is_empty() && args.iter().all(Operand::is_truthy)),
        "or" | "ou" => bool_value(args.iter().any(Operand::is_truthy)),
        "not" | "non" => bool_value(!args.first().is_some_and(Operand::is_truthy)),
        "eq" => bool_value(arg(args, 0) == arg(args, 1)),
        "neq" => bool_value(arg(args, 0) != arg(args, 1)),
        "gt" => bool_value(arg(args, 0) > arg(args, 1)),
        "gte" => bool_value(arg(args, 0) >= arg(args, 1)),
        "lt" => bool_value(arg(args, 0) < arg(args, 1)),
        "lte" => bool_value(arg(args, 0) <= arg(args, 1)),
        "present" => bool_value(args.first().is_some_and(Operand::is_present)),
        "empty" => bool_value(!args.first().is_some_and(Operand::is_present)),
        "ifnull" => {
            if !arg(args, 0).is_zero() {
                Operand::Number(arg(args, 0))
            } else {
                Operand::Number(arg(args, 1))
            }
        }
        "coalesce" => Operand::Number(numbers().find(|n| !n.is_zero()).unwrap_or(Decimal::ZERO)),
        "safediv" => {
            Operand::Number(divide(arg(args, 0), arg(args, 1)).unwrap_or_else(|| arg(args, 2)))
        }
        "iferror" | "sierreur" => match args.first() {
            Some(first) if first.is_numeric() => first.clone(),
            _ => Operand::Number(arg(args, 1)),
        },
        "percentage" => Operand::Number(
            divide(arg(args, 0), arg(args, 1))
                .and_then(|q| q.checked_mul(Decimal::ONE_HUNDRED))
                .unwrap_or(Decimal::ZERO),
        ),
        "ratio" => Operand::Number(divide(arg(args, 0), arg(args, 1)).unwrap_or(Decimal::ZERO)),
        _ => return None,
    };
    Some(value)
}
