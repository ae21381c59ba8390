use std::future::Future;

use super::{expect_eq, fixture_document, make_table, TestResult};
use crate::{RuleBaseDocument, RuleStore};

pub(super) async fn run_ordering_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "ordering",
            "node_formula_prefers_default",
            node_formula_prefers_default(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "node_formula_missing_is_none",
            node_formula_missing_is_none(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "node_table_prefers_most_recent",
            node_table_prefers_most_recent(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "node_table_default_beats_recency",
            node_table_default_beats_recency(factory).await,
        ),
        TestResult::from_result(
            "ordering",
            "table_columns_and_rows_in_index_order",
            table_columns_and_rows_in_index_order(factory).await,
        ),
    ]
}

async fn node_formula_prefers_default<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let formula = s
        .find_node_formula("calc")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("no formula attached to 'calc'")?;
    expect_eq("selected formula", formula.id.as_str(), "f-main")
}

async fn node_formula_missing_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let formula = s
        .find_node_formula("price")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("formula on plain field", formula.is_none(), true)
}

async fn node_table_prefers_most_recent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let table = s
        .find_node_table("grid")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("no table attached to 'grid'")?;
    expect_eq("selected table", table.id.as_str(), "t-new")
}

async fn node_table_default_beats_recency<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let mut doc = fixture_document();
    doc.tables
        .push(make_table("t-default", "grid", true, "2020-01-01T00:00:00Z"));
    let s = factory(doc).await;
    let table = s
        .find_node_table("grid")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("no table attached to 'grid'")?;
    expect_eq("selected table", table.id.as_str(), "t-default")
}

async fn table_columns_and_rows_in_index_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let table = s
        .get_table("t-new")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("table 't-new' not found")?;
    let columns: Vec<u32> = table.columns.iter().map(|c| c.column_index).collect();
    expect_eq("column order", columns, vec![0, 1])?;
    let rows: Vec<u32> = table.rows.iter().map(|r| r.row_index).collect();
    expect_eq("row order", rows, vec![0, 1])
}
