//! Operation interpreter -- resolves typed rule-base references into
//! values with explanation traces.
//!
//! A reference names a field, formula, condition, table lookup or fixed
//! value. [`Interpreter::interpret`] classifies it, resolves it against a
//! [`RuleStore`](optrace_storage::RuleStore) (recursing into whatever it
//! depends on) and returns an [`InterpretResult`]: the textual value, a
//! rendered explanation and a typed trace.
//!
//! Every resolver degrades its own failures into the `∅` sentinel with a
//! typed error in the trace. Only store failures propagate.

pub mod accessor;
pub mod check;
pub mod condition;
pub mod config;
pub mod context;
pub mod expression;
pub mod formula;
pub mod interpreter;
pub mod numeric;
pub mod orchestrator;
pub mod reference;
pub mod table;
pub mod types;

pub use check::{check_rule_base, ConfigIssue, EntityKind};
pub use config::{BranchResolution, EvalOptions};
pub use context::{EvalContext, ResolutionLog, ResolvedReference};
pub use interpreter::{BoxFuture, Interpreter};
pub use orchestrator::{evaluate, interpret_reference, VariableEvaluation};
pub use reference::{parse_reference, RefKind, Reference};
pub use types::{
    Branch, ConfigError, ErrorCategory, EvalError, InterpretResult, ResolveError, TraceDetails,
    EMPTY_SENTINEL,
};

// ──────────────────────────────────────────────
// Integration tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod integration_tests {
    use super::*;
    use optrace_storage::{InMemoryRuleStore, RuleBaseDocument};
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Condition `A isEmpty`: THEN formula F1 (2 + 3), ELSE field B (8).
    fn empty_check_store() -> InMemoryRuleStore {
        let doc = RuleBaseDocument::from_value(json!({
            "nodes": [
                { "id": "a", "tree_id": "t1", "label": "A", "kind": "leaf_field" },
                { "id": "b", "tree_id": "t1", "label": "B", "kind": "leaf_field" },
                { "id": "f1-node", "tree_id": "t1", "label": "F1", "kind": "node_formula" },
                { "id": "out", "tree_id": "t1", "label": "Out", "kind": "condition" }
            ],
            "variables": [
                { "id": "v-out", "node_id": "out", "source_type": "tree",
                  "source_ref": "condition:c1" }
            ],
            "formulas": [
                { "id": "f1", "node_id": "f1-node", "name": "F1", "tokens": ["2", "+", "3"] }
            ],
            "conditions": [
                { "id": "c1", "node_id": "out", "name": "A empty?", "condition_set": {
                    "branches": [{
                        "when": { "op": "isEmpty", "left": { "ref": "a" } },
                        "actions": [{ "nodeIds": ["node-formula:f1"] }]
                    }],
                    "fallback": { "actions": [{ "nodeIds": ["b"] }] }
                } }
            ],
            "submissions": [{ "id": "s1", "tree_id": "t1" }],
            "submission_values": [
                { "submission_id": "s1", "node_id": "b", "value": "8" }
            ]
        }))
        .unwrap();
        InMemoryRuleStore::from_document(doc).unwrap()
    }

    #[tokio::test]
    async fn empty_operand_selects_then_and_explains_both_branches() {
        let store = empty_check_store();
        let out = evaluate(&store, "out", "s1", BTreeMap::new(), EvalOptions::default())
            .await
            .unwrap();
        assert_eq!(out.value, "5");
        assert_eq!(out.source_kind, RefKind::Condition);
        assert!(out.explanation.starts_with("If A(∅) is empty; THEN: "));
        assert!(out.explanation.contains("2 + 3 = 5"));
        assert!(out.explanation.contains("ELSE: B(8)"));
        assert!(out.explanation.ends_with("[THEN SELECTED] Result = 5"));
        match out.trace {
            TraceDetails::Condition {
                branch_used,
                then_result,
                else_result,
                ..
            } => {
                assert_eq!(branch_used, Branch::Then);
                assert_eq!(then_result.unwrap().result, "5");
                assert_eq!(else_result.unwrap().result, "8");
            }
            other => panic!("expected a condition trace, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn filled_operand_selects_else() {
        let store = empty_check_store();
        let overrides = BTreeMap::from([("a".to_string(), json!("x"))]);
        let out = evaluate(&store, "out", "s1", overrides, EvalOptions::default())
            .await
            .unwrap();
        assert_eq!(out.value, "8");
        assert!(out.explanation.ends_with("[ELSE SELECTED] Result = 8"));
    }

    #[tokio::test]
    async fn lazy_resolution_skips_the_untaken_branch() {
        let store = empty_check_store();
        let options = EvalOptions {
            branch_resolution: BranchResolution::Lazy,
            ..EvalOptions::default()
        };
        let out = evaluate(&store, "out", "s1", BTreeMap::new(), options)
            .await
            .unwrap();
        assert_eq!(out.value, "5");
        assert!(out.explanation.contains("ELSE: not evaluated"));
        assert_eq!(out.resolution_log.resolution_count("b"), 0);
    }

    #[tokio::test]
    async fn result_serializes_with_camel_case_trace() {
        let store = empty_check_store();
        let out = evaluate(&store, "out", "s1", BTreeMap::new(), EvalOptions::default())
            .await
            .unwrap();
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["sourceKind"], "condition");
        assert_eq!(v["trace"]["type"], "condition");
        assert_eq!(v["trace"]["branchUsed"], "then");
        assert_eq!(v["sourceRef"], "condition:c1");
    }
}
