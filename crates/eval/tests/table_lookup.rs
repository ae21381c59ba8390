//! Table lookups end to end: every mode, nearest matching, prefilters,
//! extract scans, transposed authoring and failure sentinels.

use std::collections::BTreeMap;

use optrace_eval::{
    interpret_reference, EvalOptions, ErrorCategory, InterpretResult, ResolveError, TraceDetails,
};
use optrace_storage::{InMemoryRuleStore, RuleBaseDocument};
use serde_json::{json, Value};

// ──────────────────────────────────────────────
// Test helpers
// ──────────────────────────────────────────────

/// Income bracket table: `Revenu` row labels, one `Coefficient` column.
fn bracket_rows() -> Value {
    json!([
        { "row_index": 0, "cells": ["Revenu", "Coefficient"] },
        { "row_index": 1, "cells": ["1-26900", "R1-X6"] },
        { "row_index": 2, "cells": ["26901-38300", "R2-X4"] },
        { "row_index": 3, "cells": ["38301-50600", "R3-X3"] }
    ])
}

/// Price grid: rows are sizes, columns are finishes.
fn grid_rows() -> Value {
    json!([
        { "row_index": 0, "cells": ["Size", "Matte", "Gloss"] },
        { "row_index": 1, "cells": ["Small", "10", "12"] },
        { "row_index": 2, "cells": ["Large", "20", "24"] }
    ])
}

/// Motor catalogue: model rows with a type, a power and a price.
fn motor_rows() -> Value {
    json!([
        { "row_index": 0, "cells": ["Model", "Type", "Power", "Price"] },
        { "row_index": 1, "cells": ["A", "mono", "5", "100"] },
        { "row_index": 2, "cells": ["B", "tri", "7", "150"] },
        { "row_index": 3, "cells": ["C", "tri", "9", "200"] }
    ])
}

fn table(id: &str, rows: Value, lookup: Value) -> Value {
    json!({
        "id": id,
        "node_id": format!("{}-node", id),
        "name": id,
        "columns": [],
        "rows": rows,
        "meta": { "lookup": lookup }
    })
}

fn store(tables: Vec<Value>, values: Value) -> InMemoryRuleStore {
    let doc = RuleBaseDocument::from_value(json!({
        "nodes": [
            { "id": "bracket", "tree_id": "t1", "label": "Bracket", "kind": "leaf_field" },
            { "id": "income", "tree_id": "t1", "label": "Income", "kind": "leaf_field" },
            { "id": "size", "tree_id": "t1", "label": "Size", "kind": "leaf_field" },
            { "id": "finish", "tree_id": "t1", "label": "Finish", "kind": "leaf_field" },
            { "id": "node_income_x2", "tree_id": "t1", "label": "Income x2",
              "kind": "node_formula" },
            { "id": "kind", "tree_id": "t1", "label": "Kind", "kind": "leaf_field" },
            { "id": "model", "tree_id": "t1", "label": "Model", "kind": "leaf_field" },
            { "id": "metric", "tree_id": "t1", "label": "Metric", "kind": "leaf_field" },
            { "id": "target", "tree_id": "t1", "label": "Target", "kind": "leaf_field" }
        ],
        "formulas": [
            { "id": "f-income", "node_id": "node_income_x2", "name": "Income x2",
              "tokens": [{ "ref": "income" }, "*", "2"] }
        ],
        "tables": tables,
        "submissions": [{ "id": "s1", "tree_id": "t1" }],
        "submission_values": values
    }))
    .unwrap();
    InMemoryRuleStore::from_document(doc).unwrap()
}

fn value(node_id: &str, value: &str) -> Value {
    json!({ "submission_id": "s1", "node_id": node_id, "value": value })
}

async fn lookup(store: &InMemoryRuleStore, table_id: &str) -> InterpretResult {
    interpret_reference(
        store,
        &format!("@table.{}", table_id),
        "s1",
        BTreeMap::new(),
        EvalOptions::default(),
    )
    .await
    .unwrap()
}

fn failure(result: &InterpretResult) -> &ResolveError {
    match &result.details {
        TraceDetails::Failure { error, .. } => error,
        other => panic!("expected a failure trace, got {:?}", other),
    }
}

// ──────────────────────────────────────────────
// Column-fixed
// ──────────────────────────────────────────────

#[tokio::test]
async fn column_fixed_reads_the_selected_row() {
    let t = table(
        "coef",
        bracket_rows(),
        json!({
            "enabled": true,
            "columnLookupEnabled": true,
            "selectors": { "columnFieldId": "bracket" },
            "displayColumn": "Coefficient"
        }),
    );
    let store = store(vec![t], json!([value("bracket", "\"38301-50600\"")]));

    let r = lookup(&store, "coef").await;
    assert_eq!(r.result, "R3-X3");
    assert_eq!(
        r.human_text,
        "Table \"coef\"[Bracket=38301-50600, Coefficient(fixed)] = Coefficient=R3-X3"
    );
}

#[tokio::test]
async fn field_selector_falls_back_to_the_nearest_bracket() {
    let t = table(
        "coef",
        bracket_rows(),
        json!({
            "columnLookupEnabled": true,
            "columnSourceOption": { "type": "field", "sourceField": "income" },
            "displayColumn": "Coefficient"
        }),
    );
    let store = store(vec![t], json!([value("income", "50000")]));

    let r = lookup(&store, "coef").await;
    assert_eq!(r.result, "R3-X3");
}

#[tokio::test]
async fn capacity_selector_resolves_through_a_formula() {
    let t = table(
        "coef",
        bracket_rows(),
        json!({
            "columnLookupEnabled": true,
            "columnSourceOption": { "type": "capacity", "capacityRef": "node_income_x2" },
            "displayColumn": "Coefficient"
        }),
    );
    // 15000 * 2 = 30000 falls in the second bracket.
    let store = store(vec![t], json!([value("income", "15000")]));

    let r = lookup(&store, "coef").await;
    assert_eq!(r.result, "R2-X4");
    assert!(r.human_text.contains("Income x2=30000"));
}

#[tokio::test]
async fn comparison_column_picks_the_first_satisfying_row() {
    let rows = json!([
        { "row_index": 0, "cells": ["Model", "Max power", "Price"] },
        { "row_index": 1, "cells": ["S", "3", "100"] },
        { "row_index": 2, "cells": ["M", "6", "180"] },
        { "row_index": 3, "cells": ["L", "9", "250"] }
    ]);
    let t = table(
        "models",
        rows,
        json!({
            "columnLookupEnabled": true,
            "columnSourceOption": { "type": "field", "sourceField": "income",
                                    "operator": ">=", "comparisonColumn": "Max power" },
            "displayColumn": ["Model", "Price"]
        }),
    );
    let store = store(vec![t], json!([value("income", "5")]));

    let r = lookup(&store, "models").await;
    assert_eq!(r.result, r#"["M","180"]"#);
}

#[tokio::test]
async fn blank_column_selector_is_a_configuration_sentinel() {
    let t = table(
        "coef",
        bracket_rows(),
        json!({
            "columnLookupEnabled": true,
            "selectors": { "columnFieldId": "bracket" },
            "displayColumn": "Coefficient"
        }),
    );
    let store = store(vec![t], json!([]));

    let r = lookup(&store, "coef").await;
    assert!(r.is_empty_sentinel());
    assert!(matches!(failure(&r), ResolveError::NoColumnSelection { .. }));
}

// ──────────────────────────────────────────────
// Row-fixed
// ──────────────────────────────────────────────

#[tokio::test]
async fn row_fixed_reads_the_selected_column() {
    let t = table(
        "prices",
        grid_rows(),
        json!({
            "rowLookupEnabled": true,
            "selectors": { "rowFieldId": "size" },
            "displayRow": "Gloss"
        }),
    );
    let store = store(vec![t], json!([value("size", "\"Large\"")]));

    let r = lookup(&store, "prices").await;
    assert_eq!(r.result, "24");
}

// ──────────────────────────────────────────────
// Crossing
// ──────────────────────────────────────────────

fn crossing(id: &str) -> Value {
    table(
        id,
        grid_rows(),
        json!({
            "rowLookupEnabled": true,
            "columnLookupEnabled": true,
            "selectors": { "rowFieldId": "size", "columnFieldId": "finish" }
        }),
    )
}

#[tokio::test]
async fn crossing_reads_one_cell() {
    let store = store(
        vec![crossing("prices")],
        json!([value("size", "\"Small\""), value("finish", "\"Gloss\"")]),
    );

    let r = lookup(&store, "prices").await;
    assert_eq!(r.result, "12");
    assert_eq!(r.human_text, "Table \"prices\"[Size=Small, Finish=Gloss] = 12");
}

#[tokio::test]
async fn crossing_tolerates_transposed_selectors() {
    let store = store(
        vec![crossing("prices")],
        json!([value("size", "\"Matte\""), value("finish", "\"Large\"")]),
    );

    let r = lookup(&store, "prices").await;
    assert_eq!(r.result, "20");
}

#[tokio::test]
async fn crossing_without_a_match_is_value_not_found() {
    let store = store(
        vec![crossing("prices")],
        json!([value("size", "\"Huge\""), value("finish", "\"Gloss\"")]),
    );

    let r = lookup(&store, "prices").await;
    assert!(r.is_empty_sentinel());
    assert!(matches!(failure(&r), ResolveError::ValueNotFound { .. }));
}

#[tokio::test]
async fn crossing_needs_both_selectors() {
    let store = store(vec![crossing("prices")], json!([value("size", "\"Small\"")]));

    let r = lookup(&store, "prices").await;
    match failure(&r) {
        ResolveError::MissingSelection { row, column, .. } => {
            assert_eq!(row.as_deref(), Some("Small"));
            assert_eq!(column, &None);
        }
        other => panic!("expected a missing selection, got {:?}", other),
    }
}

// ──────────────────────────────────────────────
// Prefilter and extract
// ──────────────────────────────────────────────

#[tokio::test]
async fn column_fixed_comparison_skips_filtered_rows() {
    let t = table(
        "motors",
        motor_rows(),
        json!({
            "columnLookupEnabled": true,
            "columnSourceOption": { "type": "field", "sourceField": "target",
                                    "operator": ">=", "comparisonColumn": "Power",
                                    "filterColumn": "Type", "filterOperator": "equals",
                                    "filterValueRef": "@value.kind" },
            "displayColumn": "Model"
        }),
    );
    // Without the filter, A (power 5) would be the first row >= 4.
    let store = store(
        vec![t],
        json!([value("target", "4"), value("kind", "\"tri\"")]),
    );

    let r = lookup(&store, "motors").await;
    assert_eq!(r.result, "B");
}

fn row_fixed_with_filter() -> Value {
    table(
        "motors",
        motor_rows(),
        json!({
            "rowLookupEnabled": true,
            "selectors": { "rowFieldId": "model" },
            "rowSourceOption": { "type": "select", "filterColumn": "Type",
                                 "filterOperator": "equals", "filterValueRef": "@value.kind" },
            "displayRow": "Power"
        }),
    )
}

#[tokio::test]
async fn row_fixed_honors_the_prefilter() {
    let store = store(
        vec![row_fixed_with_filter()],
        json!([value("model", "\"A\""), value("kind", "\"tri\"")]),
    );

    let r = lookup(&store, "motors").await;
    assert!(r.is_empty_sentinel());
    assert!(matches!(failure(&r), ResolveError::ValueNotFound { .. }));
}

#[tokio::test]
async fn row_fixed_reads_a_row_that_passes_the_prefilter() {
    let store = store(
        vec![row_fixed_with_filter()],
        json!([value("model", "\"A\""), value("kind", "\"mono\"")]),
    );

    let r = lookup(&store, "motors").await;
    assert_eq!(r.result, "5");
}

#[tokio::test]
async fn crossing_honors_the_prefilter() {
    let t = table(
        "motors",
        motor_rows(),
        json!({
            "rowLookupEnabled": true,
            "columnLookupEnabled": true,
            "selectors": { "rowFieldId": "model", "columnFieldId": "metric" },
            "rowSourceOption": { "type": "select", "filterColumn": "Type",
                                 "filterOperator": "equals", "filterValueRef": "@value.kind" }
        }),
    );
    let store = store(
        vec![t],
        json!([
            value("model", "\"A\""),
            value("metric", "\"Price\""),
            value("kind", "\"tri\"")
        ]),
    );

    let r = lookup(&store, "motors").await;
    assert!(r.is_empty_sentinel());
    assert!(matches!(failure(&r), ResolveError::ValueNotFound { .. }));
}

fn extract_table(display: Value) -> Value {
    table(
        "motors",
        motor_rows(),
        json!({
            "columnLookupEnabled": true,
            "selectors": { "columnFieldId": "metric" },
            "extractValueRef": "@value.target",
            "extractOperator": ">=",
            "displayColumn": display
        }),
    )
}

#[tokio::test]
async fn extract_returns_the_first_satisfying_row() {
    let store = store(
        vec![extract_table(json!(["Model", "Price"]))],
        json!([value("metric", "\"Power\""), value("target", "6")]),
    );

    let r = lookup(&store, "motors").await;
    assert_eq!(r.result, r#"["B","150"]"#);
    assert_eq!(
        r.human_text,
        "Table \"motors\"[extract @value.target >= -> row=B] = Model=B, Price=150"
    );
}

#[tokio::test]
async fn extract_without_a_satisfying_row_is_value_not_found() {
    let store = store(
        vec![extract_table(json!(["Model"]))],
        json!([value("metric", "\"Power\""), value("target", "50")]),
    );

    let r = lookup(&store, "motors").await;
    assert!(r.is_empty_sentinel());
    assert!(matches!(failure(&r), ResolveError::ValueNotFound { .. }));
}

#[tokio::test]
async fn extract_with_unknown_display_headers_is_value_not_found() {
    let store = store(
        vec![extract_table(json!(["Missing"]))],
        json!([value("metric", "\"Power\""), value("target", "6")]),
    );

    let r = lookup(&store, "motors").await;
    assert!(r.is_empty_sentinel());
    assert!(matches!(failure(&r), ResolveError::ValueNotFound { .. }));
    assert!(!r.human_text.contains("[]"));
}

// ──────────────────────────────────────────────
// Configuration failures
// ──────────────────────────────────────────────

#[tokio::test]
async fn disabled_lookup_is_a_sentinel() {
    let t = table("off", grid_rows(), json!({ "enabled": false }));
    let store = store(vec![t], json!([]));

    let r = lookup(&store, "off").await;
    assert!(r.is_empty_sentinel());
    assert_eq!(r.human_text, "lookup not enabled for table 'off'");
    match &r.details {
        TraceDetails::Failure { category, .. } => {
            assert_eq!(*category, ErrorCategory::InvalidConfiguration)
        }
        other => panic!("expected a failure trace, got {:?}", other),
    }
}

#[tokio::test]
async fn table_is_found_through_its_node() {
    let t = table(
        "coef",
        bracket_rows(),
        json!({
            "columnLookupEnabled": true,
            "selectors": { "columnFieldId": "bracket" },
            "displayColumn": "Coefficient"
        }),
    );
    let store = store(vec![t], json!([value("bracket", "\"1-26900\"")]));

    let r = interpret_reference(
        &store,
        "node-table:coef-node",
        "s1",
        BTreeMap::new(),
        EvalOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(r.result, "R1-X6");
}
