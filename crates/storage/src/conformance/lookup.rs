use std::future::Future;

use super::{expect_eq, fixture_document, TestResult};
use crate::{RuleBaseDocument, RuleStore};

pub(super) async fn run_lookup_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "lookup",
            "node_read_by_id",
            node_read_by_id(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "missing_node_is_none",
            missing_node_is_none(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "variable_read_by_owning_node",
            variable_read_by_owning_node(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "capabilities_read_by_id",
            capabilities_read_by_id(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "condition_read_by_owning_node",
            condition_read_by_owning_node(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "missing_capabilities_are_none",
            missing_capabilities_are_none(factory).await,
        ),
    ]
}

// ── 1. get_node returns the seeded record ───────────────────────────────────

async fn node_read_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let node = s
        .get_node("price")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("node 'price' not found")?;
    expect_eq("label", node.label.as_str(), "Label price")?;
    expect_eq("kind", node.kind.as_str(), "leaf_field")?;
    expect_eq("tree_id", node.tree_id.as_str(), "tree-1")
}

// ── 2. absence is Ok(None), not an error ─────────────────────────────────────

async fn missing_node_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    match s.get_node("nope").await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

// ── 3. variables are keyed by their owning node ─────────────────────────────

async fn variable_read_by_owning_node<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let variable = s
        .get_variable_by_node("calc")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("variable for node 'calc' not found")?;
    expect_eq("variable id", variable.id.as_str(), "var-calc")?;
    expect_eq(
        "source_ref",
        variable.source_ref.as_deref(),
        Some("node-formula:f-main"),
    )?;
    let by_variable_id = s
        .get_variable_by_node("var-calc")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("lookup by variable id", by_variable_id.is_none(), true)
}

// ── 4. formula / condition / table point reads ──────────────────────────────

async fn capabilities_read_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let formula = s
        .get_formula("f-alt")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("formula 'f-alt' not found")?;
    expect_eq("formula node", formula.node_id.as_str(), "calc")?;

    let condition = s
        .get_condition("c-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("condition 'c-1' not found")?;
    expect_eq("condition name", condition.name.as_str(), "Price empty")?;

    let table = s
        .get_table("t-old")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("table 't-old' not found")?;
    expect_eq("table rows", table.rows.len(), 2)
}

// ── 5. conditions are reachable from their owning node ───────────────────────

async fn condition_read_by_owning_node<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let condition = s
        .find_node_condition("calc")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("no condition attached to 'calc'")?;
    expect_eq("condition id", condition.id.as_str(), "c-1")?;
    let none = s
        .find_node_condition("price")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("condition on plain field", none.is_none(), true)
}

// ── 6. unknown capability ids are Ok(None) ──────────────────────────────────

async fn missing_capabilities_are_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let formula = s.get_formula("calc").await.map_err(|e| e.to_string())?;
    expect_eq("formula by node id", formula.is_none(), true)?;
    let condition = s.get_condition("c-404").await.map_err(|e| e.to_string())?;
    expect_eq("unknown condition", condition.is_none(), true)?;
    let table = s.get_table("grid").await.map_err(|e| e.to_string())?;
    expect_eq("table by node id", table.is_none(), true)
}
