//! Formula resolution.
//!
//! A formula's token stream compiles to an expression with one positional
//! placeholder per distinct reference. Each reference is resolved once
//! through the dispatcher and its numeric reading is fed to the expression
//! evaluator. The explanation interleaves `label(value)` renderings with the
//! literal tokens in authored order.

use std::collections::BTreeMap;

use log::debug;
use optrace_storage::RuleStore;
use serde_json::Value;

use crate::accessor;
use crate::context::EvalContext;
use crate::expression::{evaluate_expression, ExpressionOptions, Operand};
use crate::interpreter::Interpreter;
use crate::numeric::{format_decimal, parse_decimal};
use crate::reference::{looks_like_reference, parse_reference, RefKind};
use crate::types::{
    decode_embedded, ConfigError, Failure, FormulaVariable, InterpretResult, ResolveError,
    TraceDetails,
};

/// One authored token, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaToken {
    /// Names an entity to resolve.
    Reference(String),
    /// Operator, number, parenthesis or any other expression text.
    Literal(String),
}

fn classify_text(text: &str) -> FormulaToken {
    if text.trim() == "CONCAT" {
        FormulaToken::Literal("&".to_string())
    } else if looks_like_reference(text) {
        FormulaToken::Reference(text.trim().to_string())
    } else {
        FormulaToken::Literal(text.to_string())
    }
}

/// Decode a stored token stream.
///
/// Accepts a JSON array (or a string holding one) of strings, numbers and
/// objects. Objects carry a reference under `ref` or `nodeId`, or a literal
/// under `value`. `null` is an empty stream.
pub fn parse_tokens(tokens: &Value) -> Result<Vec<FormulaToken>, ConfigError> {
    let decoded = decode_embedded(tokens, "tokens")?;
    let items = match &decoded {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => {
            return Err(ConfigError::WrongShape {
                path: "tokens".to_string(),
                expected: "an array",
            })
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let path = || format!("tokens[{}]", i);
            match item {
                Value::String(s) => Ok(classify_text(s)),
                Value::Number(n) => Ok(FormulaToken::Literal(n.to_string())),
                Value::Object(map) => {
                    let reference = map
                        .get("ref")
                        .or_else(|| map.get("nodeId"))
                        .and_then(Value::as_str);
                    if let Some(r) = reference {
                        return Ok(FormulaToken::Reference(r.trim().to_string()));
                    }
                    match map.get("value") {
                        Some(Value::String(s)) => Ok(classify_text(s)),
                        Some(Value::Number(n)) => Ok(FormulaToken::Literal(n.to_string())),
                        Some(_) => Err(ConfigError::WrongShape {
                            path: format!("{}.value", path()),
                            expected: "a string or number",
                        }),
                        None => Err(ConfigError::Missing {
                            path: format!("{}.ref", path()),
                        }),
                    }
                }
                _ => Err(ConfigError::WrongShape {
                    path: path(),
                    expected: "a string, number or object",
                }),
            }
        })
        .collect()
}

/// Join pieces with single spaces, without padding inside parentheses.
fn tidy(pieces: &[String]) -> String {
    pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("( ", "(")
        .replace(" )", ")")
}

impl<'s, S: RuleStore + ?Sized> Interpreter<'s, S> {
    /// Resolve a formula by its id, else by the owning node's default formula.
    pub(crate) async fn resolve_formula(
        &self,
        id: &str,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        let formula = match self.store().get_formula(id).await? {
            Some(f) => f,
            None => self
                .store()
                .find_node_formula(id)
                .await?
                .ok_or_else(|| ResolveError::NotFound {
                    kind: RefKind::Formula,
                    id: id.to_string(),
                })?,
        };

        let tokens = parse_tokens(&formula.tokens).map_err(|e| ResolveError::EvaluationFailure {
            message: format!("formula '{}': {}", formula.id, e),
        })?;

        let mut keys: Vec<String> = Vec::new();
        let mut variables: Vec<FormulaVariable> = Vec::new();
        let mut values: BTreeMap<String, Operand> = BTreeMap::new();
        let mut expression = Vec::with_capacity(tokens.len());
        let mut human = Vec::with_capacity(tokens.len());

        for token in &tokens {
            let raw = match token {
                FormulaToken::Literal(text) => {
                    expression.push(text.clone());
                    human.push(text.clone());
                    continue;
                }
                FormulaToken::Reference(raw) => raw,
            };

            let parsed = parse_reference(raw);
            let key = format!("{}::{}", parsed.kind, parsed.id);
            let index = match keys.iter().position(|k| *k == key) {
                Some(index) => index,
                None => {
                    let resolved = self.interpret(raw, ctx, depth + 1, None).await?;
                    let label = match resolved.details.display_name().filter(|n| !n.is_empty()) {
                        Some(name) => name.to_string(),
                        None => accessor::node_label(self.store(), ctx, &parsed.id).await?,
                    };
                    let placeholder = format!("var_{}", keys.len());
                    let number = parse_decimal(&resolved.result).unwrap_or_default();
                    values.insert(placeholder.clone(), Operand::Number(number));
                    keys.push(key);
                    variables.push(FormulaVariable {
                        placeholder,
                        reference: raw.clone(),
                        label,
                        value: resolved.result,
                    });
                    keys.len() - 1
                }
            };
            let var = &variables[index];
            expression.push(format!("{{{{{}}}}}", var.placeholder));
            human.push(format!("{}({})", var.label, var.value));
        }

        let expression = tidy(&expression);
        let human_expression = tidy(&human);

        let (value, issues) = if expression.is_empty() {
            (rust_decimal::Decimal::ZERO, Vec::new())
        } else {
            let outcome = evaluate_expression(
                &expression,
                &values,
                &ExpressionOptions::from(self.options()),
            )
            .map_err(|e| ResolveError::EvaluationFailure {
                message: format!("formula computation error: {}", e),
            })?;
            let codes = outcome.issues.iter().map(|i| i.code().to_string()).collect();
            (outcome.value, codes)
        };

        let result = format_decimal(value);
        debug!("formula {} = {} ({})", formula.id, result, expression);

        let human_text = if human_expression.is_empty() {
            result.clone()
        } else {
            format!("{} = {}", human_expression, result)
        };

        Ok(InterpretResult::new(
            result,
            human_text,
            TraceDetails::Formula {
                formula_id: formula.id,
                formula_name: formula.name,
                expression,
                human_expression,
                variables,
                issues,
            },
        ))
    }
}
