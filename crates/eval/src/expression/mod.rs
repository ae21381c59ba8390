//! Token-expression evaluator.
//!
//! Evaluates expression text with `{{name}}` placeholders against a
//! [`VariableSource`]. Pipeline: validate, tokenize, shunting-yard to RPN,
//! stack evaluation. Parse failures are errors; runtime problems (division
//! by zero, unknown functions, stack underflow) are collected as
//! [`EvalIssue`]s and evaluation continues with a substitute value.

mod functions;
mod lexer;
mod rpn;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::warn;
use rust_decimal::Decimal;

use crate::config::EvalOptions;
use crate::numeric::{format_decimal, parse_decimal};
use lexer::Op;
use rpn::RpnItem;

/// A value on the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(Decimal),
    Text(String),
}

impl Operand {
    /// Numeric reading; unparsable text is zero.
    pub fn to_number(&self) -> Decimal {
        match self {
            Operand::Number(n) => *n,
            Operand::Text(t) => parse_decimal(t).unwrap_or(Decimal::ZERO),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Operand::Number(n) => format_decimal(*n),
            Operand::Text(t) => t.clone(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        !self.to_number().is_zero()
    }

    /// Numbers are always present; text when it has non-blank content.
    pub fn is_present(&self) -> bool {
        match self {
            Operand::Number(_) => true,
            Operand::Text(t) => !t.trim().is_empty(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        match self {
            Operand::Number(_) => true,
            Operand::Text(t) => parse_decimal(t).is_some(),
        }
    }
}

/// Supplies placeholder values.
pub trait VariableSource {
    fn lookup(&self, name: &str) -> Option<Operand>;
}

impl VariableSource for HashMap<String, Operand> {
    fn lookup(&self, name: &str) -> Option<Operand> {
        self.get(name).cloned()
    }
}

impl VariableSource for BTreeMap<String, Operand> {
    fn lookup(&self, name: &str) -> Option<Operand> {
        self.get(name).cloned()
    }
}

/// Evaluator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionOptions {
    pub division_by_zero_value: Decimal,
    pub max_length: usize,
    /// Report placeholders the source cannot supply.
    pub strict_variables: bool,
}

impl Default for ExpressionOptions {
    fn default() -> Self {
        ExpressionOptions::from(&EvalOptions::default())
    }
}

impl From<&EvalOptions> for ExpressionOptions {
    fn from(options: &EvalOptions) -> Self {
        ExpressionOptions {
            division_by_zero_value: options.division_by_zero_value,
            max_length: options.max_expression_length,
            strict_variables: false,
        }
    }
}

/// Malformed expression text.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionError {
    TooLong { length: usize, max: usize },
    InvalidCharacter { ch: char },
    UnexpectedCharacter { ch: char, position: usize },
    UnexpectedIdentifier { name: String },
    UnterminatedString,
    UnterminatedPlaceholder,
    UnbalancedParentheses,
    MisplacedComma,
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::TooLong { length, max } => {
                write!(f, "expression too long ({} > {} characters)", length, max)
            }
            ExpressionError::InvalidCharacter { ch } => {
                write!(f, "invalid character '{}'", ch)
            }
            ExpressionError::UnexpectedCharacter { ch, position } => {
                write!(f, "unexpected character '{}' at {}", ch, position)
            }
            ExpressionError::UnexpectedIdentifier { name } => {
                write!(f, "unexpected identifier '{}'", name)
            }
            ExpressionError::UnterminatedString => write!(f, "unterminated string literal"),
            ExpressionError::UnterminatedPlaceholder => write!(f, "unterminated placeholder"),
            ExpressionError::UnbalancedParentheses => write!(f, "unbalanced parentheses"),
            ExpressionError::MisplacedComma => write!(f, "comma outside a function call"),
        }
    }
}

impl std::error::Error for ExpressionError {}

/// A non-fatal runtime problem.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalIssue {
    DivisionByZero,
    UnknownVariable(String),
    StackUnderflow,
    UnknownFunction(String),
    InvalidResult,
}

impl EvalIssue {
    pub fn code(&self) -> &'static str {
        match self {
            EvalIssue::DivisionByZero => "division_by_zero",
            EvalIssue::UnknownVariable(_) => "unknown_variable",
            EvalIssue::StackUnderflow => "stack_underflow",
            EvalIssue::UnknownFunction(_) => "unknown_function",
            EvalIssue::InvalidResult => "invalid_result",
        }
    }
}

/// Final numeric value plus the issues met on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionOutcome {
    pub value: Decimal,
    pub issues: Vec<EvalIssue>,
}

/// Evaluate `expr` against `vars`.
pub fn evaluate_expression(
    expr: &str,
    vars: &dyn VariableSource,
    options: &ExpressionOptions,
) -> Result<ExpressionOutcome, ExpressionError> {
    lexer::validate(expr, options.max_length)?;
    let tokens = lexer::tokenize(expr)?;
    let program = rpn::to_rpn(tokens)?;

    let mut issues = Vec::new();
    let value = run(&program, vars, options, &mut issues);
    for issue in &issues {
        warn!("expression '{}': {}", expr, issue.code());
    }
    Ok(ExpressionOutcome { value, issues })
}

fn run(
    program: &[RpnItem],
    vars: &dyn VariableSource,
    options: &ExpressionOptions,
    issues: &mut Vec<EvalIssue>,
) -> Decimal {
    let mut stack: Vec<Operand> = Vec::new();

    for item in program {
        match item {
            RpnItem::Number(n) => stack.push(Operand::Number(*n)),
            RpnItem::Text(t) => stack.push(Operand::Text(t.clone())),
            RpnItem::Variable(name) => match vars.lookup(name) {
                Some(v) => stack.push(v),
                None => {
                    if options.strict_variables {
                        issues.push(EvalIssue::UnknownVariable(name.clone()));
                    }
                    stack.push(Operand::Number(Decimal::ZERO));
                }
            },
            RpnItem::Operator(op) if op.is_unary() => {
                let Some(a) = stack.pop() else {
                    issues.push(EvalIssue::StackUnderflow);
                    return Decimal::ZERO;
                };
                stack.push(Operand::Number(-a.to_number()));
            }
            RpnItem::Operator(op) => {
                let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                    issues.push(EvalIssue::StackUnderflow);
                    return Decimal::ZERO;
                };
                stack.push(apply_binary(*op, a, b, options, issues));
            }
            RpnItem::Call { name, argc } => {
                if stack.len() < *argc {
                    issues.push(EvalIssue::StackUnderflow);
                    return Decimal::ZERO;
                }
                let args = stack.split_off(stack.len() - argc);
                match functions::call(name, &args, issues) {
                    Some(v) => stack.push(v),
                    None => {
                        issues.push(EvalIssue::UnknownFunction(name.clone()));
                        stack.push(Operand::Number(Decimal::ZERO));
                    }
                }
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(v), true) => v.to_number(),
        (Some(_), false) => {
            issues.push(EvalIssue::InvalidResult);
            Decimal::ZERO
        }
        (None, _) => {
            issues.push(EvalIssue::StackUnderflow);
            Decimal::ZERO
        }
    }
}

fn checked(result: Option<Decimal>, issues: &mut Vec<EvalIssue>) -> Operand {
    match result {
        Some(v) => Operand::Number(v),
        None => {
            issues.push(EvalIssue::InvalidResult);
            Operand::Number(Decimal::ZERO)
        }
    }
}

fn compare(op: Op, a: &Operand, b: &Operand) -> bool {
    // Equality is textual unless both sides read as numbers.
    if matches!(op, Op::Eq | Op::Neq) && !(a.is_numeric() && b.is_numeric()) {
        let equal = a.to_text() == b.to_text();
        return if op == Op::Eq { equal } else { !equal };
    }
    let (x, y) = (a.to_number(), b.to_number());
    match op {
        Op::Gt => x > y,
        Op::Gte => x >= y,
        Op::Lt => x < y,
        Op::Lte => x <= y,
        Op::Eq => x == y,
        Op::Neq => x != y,
        _ => false,
    }
}

fn apply_binary(
    op: Op,
    a: Operand,
    b: Operand,
    options: &ExpressionOptions,
    issues: &mut Vec<EvalIssue>,
) -> Operand {
    let bool_value = |v: bool| Operand::Number(if v { Decimal::ONE } else { Decimal::ZERO });
    match op {
        Op::Add => checked(a.to_number().checked_add(b.to_number()), issues),
        Op::Sub => checked(a.to_number().checked_sub(b.to_number()), issues),
        Op::Mul => checked(a.to_number().checked_mul(b.to_number()), issues),
        Op::Div => {
            let divisor = b.to_number();
            if divisor.is_zero() {
                issues.push(EvalIssue::DivisionByZero);
                Operand::Number(options.division_by_zero_value)
            } else {
                checked(a.to_number().checked_div(divisor), issues)
            }
        }
        Op::Pow => checked(functions::power(a.to_number(), b.to_number()), issues),
        Op::Concat => Operand::Text(format!("{}{}", a.to_text(), b.to_text())),
        Op::And => bool_value(a.is_truthy() && b.is_truthy()),
        Op::Or => bool_value(a.is_truthy() || b.is_truthy()),
        Op::Gt | Op::Gte | Op::Lt | Op::Lte | Op::Eq | Op::Neq => bool_value(compare(op, &a, &b)),
        Op::Neg => Operand::Number(-b.to_number()),
    }
}
