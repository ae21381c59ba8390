//! Condition resolution.
//!
//! A condition set holds one when-clause and two targets. Operands are
//! resolved, the operator picks a side, and the targets are resolved
//! according to [`BranchResolution`]: both sides under `Eager` so the
//! explanation covers the untaken path, only the selected side under `Lazy`.

use log::{debug, warn};
use optrace_storage::RuleStore;
use serde_json::Value;

use crate::accessor;
use crate::config::BranchResolution;
use crate::context::EvalContext;
use crate::interpreter::Interpreter;
use crate::numeric::compare_magnitude;
use crate::reference::{kind_from_node_kind, looks_like_reference, parse_reference, RefKind};
use crate::types::{
    decode_embedded, Branch, ConfigError, Failure, InterpretResult, OperandTrace, ResolveError,
    TraceDetails, EMPTY_SENTINEL,
};

// ── Typed condition set ─────────────────────────────────────────────────────

/// One side of a when-clause as authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandSpec {
    Reference(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhenClause {
    pub op: String,
    pub left: Option<OperandSpec>,
    pub right: Option<OperandSpec>,
}

/// The first branch of a stored condition set plus its fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSet {
    pub when: Option<WhenClause>,
    pub then_target: Option<String>,
    pub else_target: Option<String>,
}

fn expect_object<'v>(
    value: &'v Value,
    path: &str,
) -> Result<&'v serde_json::Map<String, Value>, ConfigError> {
    value.as_object().ok_or_else(|| ConfigError::WrongShape {
        path: path.to_string(),
        expected: "an object",
    })
}

fn parse_operand(value: Option<&Value>, path: &str) -> Result<Option<OperandSpec>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    Ok(match value {
        Value::Null => None,
        Value::String(s) if s.trim().starts_with('@') || looks_like_reference(s) => {
            Some(OperandSpec::Reference(s.trim().to_string()))
        }
        Value::String(s) => Some(OperandSpec::Literal(s.clone())),
        Value::Number(n) => Some(OperandSpec::Literal(n.to_string())),
        Value::Bool(b) => Some(OperandSpec::Literal(b.to_string())),
        Value::Object(map) => {
            if let Some(r) = map.get("ref").and_then(Value::as_str) {
                Some(OperandSpec::Reference(r.trim().to_string()))
            } else {
                match map.get("value") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(OperandSpec::Literal(s.clone())),
                    Some(Value::Number(n)) => Some(OperandSpec::Literal(n.to_string())),
                    Some(Value::Bool(b)) => Some(OperandSpec::Literal(b.to_string())),
                    Some(_) => {
                        return Err(ConfigError::WrongShape {
                            path: format!("{}.value", path),
                            expected: "a scalar",
                        })
                    }
                }
            }
        }
        Value::Array(_) => {
            return Err(ConfigError::WrongShape {
                path: path.to_string(),
                expected: "an operand",
            })
        }
    })
}

/// `actions[0].nodeIds[0]` of a branch, when present.
fn first_target(branch: &Value) -> Option<String> {
    branch
        .get("actions")?
        .get(0)?
        .get("nodeIds")?
        .get(0)?
        .as_str()
        .map(str::to_string)
}

/// Decode a stored condition set (an object, or a string holding one).
pub fn parse_condition_set(value: &Value) -> Result<ConditionSet, ConfigError> {
    let decoded = decode_embedded(value, "conditionSet")?;
    let root = expect_object(&decoded, "conditionSet")?;

    let branch = match root.get("branches") {
        None | Some(Value::Null) => None,
        Some(Value::Array(branches)) => branches.first(),
        Some(_) => {
            return Err(ConfigError::WrongShape {
                path: "branches".to_string(),
                expected: "an array",
            })
        }
    };

    let when = match branch.and_then(|b| b.get("when")) {
        None | Some(Value::Null) => None,
        Some(when) => {
            let when = expect_object(when, "branches[0].when")?;
            let op = when
                .get("op")
                .and_then(Value::as_str)
                .ok_or_else(|| ConfigError::Missing {
                    path: "branches[0].when.op".to_string(),
                })?;
            Some(WhenClause {
                op: op.trim().to_string(),
                left: parse_operand(when.get("left"), "branches[0].when.left")?,
                right: parse_operand(when.get("right"), "branches[0].when.right")?,
            })
        }
    };

    Ok(ConditionSet {
        when,
        then_target: branch.and_then(first_target),
        else_target: root.get("fallback").and_then(first_target),
    })
}

// ── Operators ───────────────────────────────────────────────────────────────

fn is_blank(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.trim().is_empty() || v == EMPTY_SENTINEL,
    }
}

/// Case-insensitive text test; false when either side is blank.
fn text_match(left: Option<&str>, right: Option<&str>, test: fn(&str, &str) -> bool) -> bool {
    match (left, right) {
        (Some(l), Some(r)) if !is_blank(left) && !is_blank(right) => {
            test(&l.to_lowercase(), &r.to_lowercase())
        }
        _ => false,
    }
}

/// Apply a condition operator. Unknown operators are false.
pub fn evaluate_operator(op: &str, left: Option<&str>, right: Option<&str>) -> bool {
    let magnitude =
        |symbol: &str| compare_magnitude(left.unwrap_or("0"), right.unwrap_or("0"), symbol);
    match op {
        "isEmpty" => is_blank(left),
        "isNotEmpty" => !is_blank(left),
        "eq" | "==" => left == right,
        "ne" | "!=" => left != right,
        "gt" | ">" => magnitude(">"),
        "gte" | ">=" => magnitude(">="),
        "lt" | "<" => magnitude("<"),
        "lte" | "<=" => magnitude("<="),
        "contains" => text_match(left, right, |l, r| l.contains(r)),
        "startsWith" | "commence par" => text_match(left, right, |l, r| l.starts_with(r)),
        other => {
            warn!("unknown condition operator '{}'", other);
            false
        }
    }
}

fn operator_text(op: &str) -> &str {
    match op {
        "isEmpty" => "is empty",
        "isNotEmpty" => "is not empty",
        "eq" | "==" => "=",
        "ne" | "!=" => "≠",
        "gt" | ">" => ">",
        "gte" | ">=" => "≥",
        "lt" | "<" => "<",
        "lte" | "<=" => "≤",
        other => other,
    }
}

fn no_action() -> InterpretResult {
    InterpretResult::new(EMPTY_SENTINEL, "No action", TraceDetails::NoAction)
}

// ── Resolver ────────────────────────────────────────────────────────────────

impl<'s, S: RuleStore + ?Sized> Interpreter<'s, S> {
    /// Resolve a condition by its id, else by the node that owns it.
    pub(crate) async fn resolve_condition(
        &self,
        id: &str,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        let condition = match self.store().get_condition(id).await? {
            Some(c) => c,
            None => self
                .store()
                .find_node_condition(id)
                .await?
                .ok_or_else(|| ResolveError::NotFound {
                    kind: RefKind::Condition,
                    id: id.to_string(),
                })?,
        };

        let set = parse_condition_set(&condition.condition_set).map_err(|e| {
            ResolveError::InvalidCondition {
                condition_id: condition.id.clone(),
                message: e.to_string(),
            }
        })?;
        let when = set.when.ok_or_else(|| ResolveError::MissingWhen {
            condition_id: condition.id.clone(),
        })?;

        let left = match &when.left {
            Some(spec) => self.resolve_operand(spec, ctx, depth).await?,
            None => OperandTrace {
                label: "Unknown".to_string(),
                value: None,
            },
        };
        let right = match &when.right {
            Some(spec) => Some(self.resolve_operand(spec, ctx, depth).await?),
            None => None,
        };

        let outcome = evaluate_operator(
            &when.op,
            left.value.as_deref(),
            right.as_ref().and_then(|r| r.value.as_deref()),
        );
        let branch_used = if outcome { Branch::Then } else { Branch::Else };
        debug!(
            "condition {} ({}) selected {}",
            condition.id,
            when.op,
            branch_used.as_str()
        );

        let eager = self.options().branch_resolution == BranchResolution::Eager;
        let then_result = if eager || outcome {
            Some(self.resolve_target(set.then_target.as_deref(), ctx, depth).await?)
        } else {
            None
        };
        let else_result = if eager || !outcome {
            Some(self.resolve_target(set.else_target.as_deref(), ctx, depth).await?)
        } else {
            None
        };

        let selected = if outcome { &then_result } else { &else_result };
        let result = selected
            .as_ref()
            .map(|r| r.result.clone())
            .unwrap_or_else(|| EMPTY_SENTINEL.to_string());

        let mut clause = format!(
            "If {}({}) {}",
            left.label,
            left.value.as_deref().unwrap_or(EMPTY_SENTINEL),
            operator_text(&when.op)
        );
        if let Some(r) = right.as_ref() {
            if !matches!(when.op.as_str(), "isEmpty" | "isNotEmpty") && !r.label.is_empty() {
                clause.push(' ');
                clause.push_str(&r.label);
            }
        }
        let render = |r: &Option<InterpretResult>| {
            r.as_ref()
                .map(|r| r.human_text.clone())
                .unwrap_or_else(|| "not evaluated".to_string())
        };
        let human_text = format!(
            "{}; THEN: {}; ELSE: {} → [{} SELECTED] Result = {}",
            clause,
            render(&then_result),
            render(&else_result),
            branch_used.as_str(),
            result
        );

        Ok(InterpretResult::new(
            result,
            human_text,
            TraceDetails::Condition {
                condition_id: condition.id,
                condition_name: condition.name,
                operator: when.op,
                left,
                right,
                outcome,
                branch_used,
                then_result: then_result.map(Box::new),
                else_result: else_result.map(Box::new),
            },
        ))
    }

    async fn resolve_operand(
        &self,
        spec: &OperandSpec,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<OperandTrace, Failure> {
        let raw = match spec {
            OperandSpec::Literal(v) => {
                return Ok(OperandTrace {
                    label: v.clone(),
                    value: Some(v.clone()),
                })
            }
            OperandSpec::Reference(raw) => raw,
        };
        let parsed = parse_reference(raw);

        if parsed.option {
            let label = match self.store().get_node(&parsed.id).await? {
                Some(_) => accessor::node_label(self.store(), ctx, &parsed.id).await?,
                None => "Unknown option".to_string(),
            };
            return Ok(OperandTrace {
                label,
                value: Some(parsed.id),
            });
        }

        let mut kind = parsed.kind;
        if !parsed.explicit {
            if let Some(node) = self.store().get_node(&parsed.id).await? {
                kind = kind_from_node_kind(&node.kind).unwrap_or(RefKind::Field);
            }
        }

        if kind == RefKind::Field {
            let value = accessor::node_value(self.store(), ctx, &parsed.id, true).await?;
            let label = accessor::node_label(self.store(), ctx, &parsed.id).await?;
            return Ok(OperandTrace {
                label,
                value: Some(value).filter(|v| !v.is_empty()),
            });
        }

        let resolved = self.interpret(raw, ctx, depth + 1, Some(kind)).await?;
        let label = resolved
            .details
            .display_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(parsed.id.as_str())
            .to_string();
        Ok(OperandTrace {
            label,
            value: Some(resolved.result),
        })
    }

    async fn resolve_target(
        &self,
        target: Option<&str>,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        match target {
            Some(t) if !t.trim().is_empty() => Ok(self.interpret(t, ctx, depth + 1, None).await?),
            _ => Ok(no_action()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvalOptions;
    use optrace_storage::{InMemoryRuleStore, RuleBaseDocument};

    fn store(doc: Value) -> InMemoryRuleStore {
        InMemoryRuleStore::from_document(RuleBaseDocument::from_value(doc).unwrap()).unwrap()
    }

    fn doc(op: &str, right: Value, price: Option<&str>) -> Value {
        let mut values = vec![serde_json::json!(
            {"submission_id": "s", "node_id": "cost", "value": "100"}
        )];
        if let Some(p) = price {
            values.push(serde_json::json!({"submission_id": "s", "node_id": "price", "value": p}));
        }
        serde_json::json!({
            "nodes": [
                {"id": "price", "tree_id": "t", "label": "Price"},
                {"id": "cost", "tree_id": "t", "label": "Cost"},
                {"id": "opt-yes", "tree_id": "t", "label": "Yes", "kind": "leaf_option"}
            ],
            "formulas": [{"id": "f1", "node_id": "price", "name": "Half cost",
                          "tokens": ["@value.cost", "/", "2"]}],
            "conditions": [{
                "id": "c1", "node_id": "price", "name": "Price check",
                "condition_set": {
                    "branches": [{
                        "when": {"op": op, "left": {"ref": "@value.price"}, "right": right},
                        "actions": [{"nodeIds": ["node-formula:f1"]}]
                    }],
                    "fallback": {"actions": [{"nodeIds": ["@value.price"]}]}
                }
            }],
            "submission_values": values
        })
    }

    #[test]
    fn parses_condition_set_stored_as_string() {
        let set = parse_condition_set(&Value::String(
            r#"{"branches":[{"when":{"op":"eq","left":"@value.a","right":{"value":3}},
                "actions":[{"nodeIds":["x"]}]}],"fallback":{"actions":[{"nodeIds":["y"]}]}}"#
                .into(),
        ))
        .unwrap();
        let when = set.when.unwrap();
        assert_eq!(when.left, Some(OperandSpec::Reference("@value.a".into())));
        assert_eq!(when.right, Some(OperandSpec::Literal("3".into())));
        assert_eq!(set.then_target.as_deref(), Some("x"));
        assert_eq!(set.else_target.as_deref(), Some("y"));
    }

    #[test]
    fn shape_errors() {
        assert!(matches!(
            parse_condition_set(&serde_json::json!([1])),
            Err(ConfigError::WrongShape { .. })
        ));
        assert!(matches!(
            parse_condition_set(&serde_json::json!({"branches": [{"when": {"left": "x"}}]})),
            Err(ConfigError::Missing { .. })
        ));
        let empty = parse_condition_set(&serde_json::json!({"branches": []})).unwrap();
        assert!(empty.when.is_none());
    }

    #[test]
    fn operators() {
        assert!(evaluate_operator("isEmpty", None, None));
        assert!(evaluate_operator("isEmpty", Some(" "), None));
        assert!(evaluate_operator("isEmpty", Some("∅"), None));
        assert!(evaluate_operator("isNotEmpty", Some("x"), None));
        assert!(evaluate_operator("==", Some("a"), Some("a")));
        assert!(evaluate_operator("ne", Some("a"), Some("b")));
        assert!(evaluate_operator("gt", Some("10"), Some("9")));
        assert!(evaluate_operator(">=", Some("1,5"), Some("1.5")));
        assert!(!evaluate_operator("lt", Some("abc"), Some("9")));
        assert!(evaluate_operator("contains", Some("Hello World"), Some("world")));
        assert!(!evaluate_operator("contains", Some("Hello"), Some("")));
        assert!(evaluate_operator("startsWith", Some("Solar panel"), Some("SOLAR")));
        assert!(!evaluate_operator("between", Some("1"), Some("2")));
    }

    #[tokio::test]
    async fn empty_left_selects_then_and_names_both_sides() {
        let s = store(doc("isEmpty", Value::Null, None));
        let interp = Interpreter::new(&s, EvalOptions::default());
        let mut ctx = EvalContext::new("s");
        let r = interp.interpret("condition:c1", &mut ctx, 0, None).await.unwrap();
        assert_eq!(r.result, "50");
        assert_eq!(
            r.human_text,
            "If Price(∅) is empty; THEN: Cost(100) / 2 = 50; ELSE: Price(0) → [THEN SELECTED] Result = 50"
        );
    }

    #[tokio::test]
    async fn filled_left_selects_else() {
        let s = store(doc("isEmpty", Value::Null, Some("80")));
        let interp = Interpreter::new(&s, EvalOptions::default());
        let mut ctx = EvalContext::new("s");
        let r = interp.interpret("condition:c1", &mut ctx, 0, None).await.unwrap();
        assert_eq!(r.result, "80");
        assert!(r.human_text.ends_with("→ [ELSE SELECTED] Result = 80"));
    }

    #[tokio::test]
    async fn literal_right_operand_is_shown() {
        let s = store(doc("gt", serde_json::json!({"value": 50}), Some("80")));
        let interp = Interpreter::new(&s, EvalOptions::default());
        let mut ctx = EvalContext::new("s");
        let r = interp.interpret("condition:c1", &mut ctx, 0, None).await.unwrap();
        assert!(r.human_text.starts_with("If Price(80) > 50; THEN:"));
        assert_eq!(r.result, "50");
    }

    #[tokio::test]
    async fn lazy_mode_skips_untaken_branch() {
        let s = store(doc("isEmpty", Value::Null, Some("80")));
        let options = EvalOptions {
            branch_resolution: BranchResolution::Lazy,
            ..EvalOptions::default()
        };
        let interp = Interpreter::new(&s, options);
        let mut ctx = EvalContext::new("s");
        let r = interp.interpret("condition:c1", &mut ctx, 0, None).await.unwrap();
        assert!(r.human_text.contains("THEN: not evaluated"));
        assert_eq!(ctx.log().resolution_count("f1"), 0);
    }

    #[tokio::test]
    async fn select_option_operand_compares_option_id() {
        let s = store(doc("eq", serde_json::json!("@select.opt-yes"), None));
        let interp = Interpreter::new(&s, EvalOptions::default());
        let mut ctx = EvalContext::new("s");
        ctx.set_value("price", serde_json::json!("opt-yes"));
        let r = interp.interpret("condition:c1", &mut ctx, 0, None).await.unwrap();
        assert!(r.human_text.starts_with("If Price(opt-yes) = Yes;"));
        assert!(r.human_text.contains("[THEN SELECTED]"));
    }

    #[tokio::test]
    async fn missing_when_clause() {
        let s = store(serde_json::json!({
            "conditions": [{"id": "c1", "node_id": "n", "condition_set": {"branches": []}}]
        }));
        let interp = Interpreter::new(&s, EvalOptions::default());
        let mut ctx = EvalContext::new("s");
        let r = interp.interpret("condition:c1", &mut ctx, 0, None).await.unwrap();
        assert!(r.is_empty_sentinel());
        assert_eq!(r.human_text, "condition 'c1' has no when-clause");
    }

    #[tokio::test]
    async fn missing_target_is_no_action() {
        let s = store(serde_json::json!({
            "conditions": [{"id": "c1", "node_id": "n", "condition_set": {
                "branches": [{"when": {"op": "isEmpty", "left": {"ref": "@value.n"}}}]
            }}]
        }));
        let interp = Interpreter::new(&s, EvalOptions::default());
        let mut ctx = EvalContext::new("s");
        let r = interp.interpret("condition:c1", &mut ctx, 0, None).await.unwrap();
        assert_eq!(r.result, "∅");
        assert!(r.human_text.contains("THEN: No action; ELSE: No action"));
    }
}
