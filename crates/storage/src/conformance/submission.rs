use std::future::Future;

use super::{expect_eq, fixture_document, make_node, TestResult};
use crate::{RuleBaseDocument, RuleStore};

pub(super) async fn run_submission_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "submission",
            "submission_header_carries_tree",
            submission_header_carries_tree(factory).await,
        ),
        TestResult::from_result(
            "submission",
            "point_read_is_scoped_to_submission",
            point_read_is_scoped_to_submission(factory).await,
        ),
        TestResult::from_result(
            "submission",
            "null_value_is_kept",
            null_value_is_kept(factory).await,
        ),
        TestResult::from_result(
            "submission",
            "bulk_listing_is_scoped_to_submission",
            bulk_listing_is_scoped_to_submission(factory).await,
        ),
        TestResult::from_result(
            "submission",
            "tree_listing_is_scoped_to_tree",
            tree_listing_is_scoped_to_tree(factory).await,
        ),
    ]
}

async fn submission_header_carries_tree<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let submission = s
        .get_submission("sub-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("submission 'sub-1' not found")?;
    expect_eq("tree_id", submission.tree_id.as_deref(), Some("tree-1"))?;
    let missing = s
        .get_submission("sub-404")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("unknown submission", missing.is_none(), true)
}

async fn point_read_is_scoped_to_submission<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let first = s
        .get_submission_value("sub-1", "price")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("value for sub-1/price not found")?;
    expect_eq("sub-1 price", first.value.as_deref(), Some("1250"))?;
    let second = s
        .get_submission_value("sub-2", "price")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("value for sub-2/price not found")?;
    expect_eq("sub-2 price", second.value.as_deref(), Some("9"))
}

async fn null_value_is_kept<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let record = s
        .get_submission_value("sub-1", "volume")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("record for sub-1/volume not found")?;
    expect_eq("volume value", record.value, None)
}

async fn bulk_listing_is_scoped_to_submission<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(fixture_document()).await;
    let values = s
        .list_submission_values("sub-1")
        .await
        .map_err(|e| e.to_string())?;
    let mut nodes: Vec<String> = values.into_iter().map(|v| v.node_id).collect();
    nodes.sort();
    expect_eq("sub-1 nodes", nodes, vec!["price".to_string(), "volume".to_string()])
}

async fn tree_listing_is_scoped_to_tree<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RuleStore,
    F: Fn(RuleBaseDocument) -> Fut,
    Fut: Future<Output = S>,
{
    let mut doc = fixture_document();
    let mut foreign = make_node("foreign", "leaf_field");
    foreign.tree_id = "tree-2".to_string();
    doc.nodes.push(foreign);
    let s = factory(doc).await;
    let nodes = s
        .list_tree_nodes("tree-1")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("tree-1 node count", nodes.len(), 5)?;
    expect_eq(
        "foreign node excluded",
        nodes.iter().any(|n| n.id == "foreign"),
        false,
    )
}
