//! Conformance test suite for `RuleStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RuleStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Lookup**: point reads by id, absence reported as `None`
//! - **Ordering**: default-first selection of node formulas and node tables,
//!   column/row index order
//! - **Submission**: per-node values, bulk listing, tree listing
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that builds
//! a fresh backend seeded from the given document:
//!
//! ```ignore
//! use optrace_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|doc| async move {
//!         seed_test_postgres(doc).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod lookup;
mod ordering;
mod submission;

use std::fmt;
use std::future::Future;

use crate::record::{
    ConditionRecord, FormulaRecord, NodeRecord, SubmissionRecord, SubmissionValueRecord,
    TableColumnRecord, TableRecord, TableRowRecord, VariableRecord,
};
use crate::{RuleBaseDocument, RuleStore};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "lookup", "ordering").
    pub category: String,
    /// Test name (e.g. "missing_node_is_none").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` is called once per test with the document to seed, so
/// every test starts from a fresh backend.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(lookup::run_lookup_tests(&factory).await);
    results.extend(ordering::run_ordering_tests(&factory).await);
    results.extend(submission::run_submission_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

/// Compare two values, describing the mismatch.
fn expect_eq<T: PartialEq + fmt::Debug>(what: &str, got: T, want: T) -> Result<(), String> {
    if got == want {
        Ok(())
    } else {
        Err(format!("{}: expected {:?}, got {:?}", what, want, got))
    }
}

// ── Fixture: a small quote tree with one of each capability ─────────────────

fn make_node(id: &str, kind: &str) -> NodeRecord {
    NodeRecord {
        id: id.to_string(),
        tree_id: "tree-1".to_string(),
        parent_id: None,
        label: format!("Label {}", id),
        kind: kind.to_string(),
        shared_reference_name: None,
        field_label: None,
        calculated_value: None,
    }
}

fn make_formula(id: &str, node_id: &str, is_default: bool) -> FormulaRecord {
    FormulaRecord {
        id: id.to_string(),
        node_id: node_id.to_string(),
        name: format!("Formula {}", id),
        tokens: serde_json::json!(["@value.price", "*", "2"]),
        is_default,
    }
}

fn make_table(id: &str, node_id: &str, is_default: bool, updated_at: &str) -> TableRecord {
    TableRecord {
        id: id.to_string(),
        node_id: node_id.to_string(),
        name: format!("Table {}", id),
        is_default,
        updated_at: Some(updated_at.to_string()),
        columns: vec![
            TableColumnRecord {
                column_index: 1,
                name: "Coefficient".to_string(),
            },
            TableColumnRecord {
                column_index: 0,
                name: "Revenue".to_string(),
            },
        ],
        rows: vec![
            TableRowRecord {
                row_index: 1,
                cells: serde_json::json!(["1-26900", "R1"]),
            },
            TableRowRecord {
                row_index: 0,
                cells: serde_json::json!(["Revenue", "Coefficient"]),
            },
        ],
        meta: serde_json::json!({}),
    }
}

fn make_value(submission_id: &str, node_id: &str, value: Option<&str>) -> SubmissionValueRecord {
    SubmissionValueRecord {
        submission_id: submission_id.to_string(),
        node_id: node_id.to_string(),
        value: value.map(str::to_string),
    }
}

fn fixture_document() -> RuleBaseDocument {
    RuleBaseDocument {
        nodes: vec![
            make_node("price", "leaf_field"),
            make_node("volume", "leaf_field"),
            make_node("calc", "node_formula"),
            make_node("grid", "node_table"),
            make_node("elsewhere", "leaf_field"),
        ],
        variables: vec![VariableRecord {
            id: "var-calc".to_string(),
            node_id: "calc".to_string(),
            exposed_key: Some("calc_key".to_string()),
            display_name: Some("Calculated".to_string()),
            source_type: Some("tree".to_string()),
            source_ref: Some("node-formula:f-main".to_string()),
            fixed_value: None,
            default_value: None,
        }],
        formulas: vec![
            make_formula("f-alt", "calc", false),
            make_formula("f-main", "calc", true),
        ],
        conditions: vec![ConditionRecord {
            id: "c-1".to_string(),
            node_id: "calc".to_string(),
            name: "Price empty".to_string(),
            condition_set: serde_json::json!({"branches": []}),
        }],
        tables: vec![
            make_table("t-old", "grid", false, "2024-01-01T00:00:00Z"),
            make_table("t-new", "grid", false, "2025-01-01T00:00:00Z"),
        ],
        submissions: vec![SubmissionRecord {
            id: "sub-1".to_string(),
            tree_id: Some("tree-1".to_string()),
        }],
        submission_values: vec![
            make_value("sub-1", "price", Some("1250")),
            make_value("sub-1", "volume", None),
            make_value("sub-2", "price", Some("9")),
        ],
    }
}
