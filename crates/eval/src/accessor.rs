//! Leaf value and label access.
//!
//! Value priority: context override, persisted submission value, the
//! node's last computed value, then empty. Label priority: context label,
//! shared-reference name, field label, node label, then `"Unknown"`.

use log::debug;
use optrace_storage::{RuleStore, StorageError};

use crate::context::EvalContext;

/// Render a JSON value as field text: strings as-is, scalars textually,
/// arrays joined with `,`, objects as compact JSON.
pub fn render_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(render_json)
            .collect::<Vec<_>>()
            .join(","),
        serde_json::Value::Object(_) => value.to_string(),
    }
}

/// Current value of a node. Empty renders as `"0"` unless `preserve_empty`.
pub async fn node_value<S: RuleStore + ?Sized>(
    store: &S,
    ctx: &EvalContext,
    node_id: &str,
    preserve_empty: bool,
) -> Result<String, StorageError> {
    let value = lookup_value(store, ctx, node_id).await?;
    Ok(match value {
        Some(v) if !v.is_empty() => v,
        _ if preserve_empty => String::new(),
        _ => "0".to_string(),
    })
}

async fn lookup_value<S: RuleStore + ?Sized>(
    store: &S,
    ctx: &EvalContext,
    node_id: &str,
) -> Result<Option<String>, StorageError> {
    if let Some(v) = ctx.value(node_id) {
        return Ok(Some(render_json(v)));
    }
    if let Some(record) = store
        .get_submission_value(ctx.submission_id(), node_id)
        .await?
    {
        if let Some(v) = record.value.filter(|v| !v.is_empty()) {
            return Ok(Some(v));
        }
    }
    if let Some(node) = store.get_node(node_id).await? {
        if let Some(v) = node.calculated_value.filter(|v| !v.is_empty()) {
            debug!("node {} falls back to its calculated value", node_id);
            return Ok(Some(v));
        }
    }
    Ok(None)
}

/// Display label of a node.
pub async fn node_label<S: RuleStore + ?Sized>(
    store: &S,
    ctx: &EvalContext,
    node_id: &str,
) -> Result<String, StorageError> {
    if let Some(label) = ctx.label(node_id) {
        return Ok(label.to_string());
    }
    let label = store.get_node(node_id).await?.and_then(|node| {
        [node.shared_reference_name, node.field_label, Some(node.label)]
            .into_iter()
            .flatten()
            .find(|l| !l.is_empty())
    });
    Ok(label.unwrap_or_else(|| "Unknown".to_string()))
}

/// Bulk-load every persisted value of the submission and the labels of
/// its tree. Existing entries (caller overrides) are never overwritten.
pub async fn seed_context<S: RuleStore + ?Sized>(
    store: &S,
    ctx: &mut EvalContext,
) -> Result<(), StorageError> {
    let submission_id = ctx.submission_id().to_string();
    let values = store.list_submission_values(&submission_id).await?;

    for record in &values {
        let Some(raw) = record.value.as_deref() else {
            continue;
        };
        let decoded = serde_json::from_str::<serde_json::Value>(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        if decoded.is_null() {
            continue;
        }
        ctx.seed_value(&record.node_id, decoded);
    }

    let mut tree_id = store
        .get_submission(&submission_id)
        .await?
        .and_then(|s| s.tree_id);
    if tree_id.is_none() {
        if let Some(first) = values.first() {
            tree_id = store.get_node(&first.node_id).await?.map(|n| n.tree_id);
        }
    }

    if let Some(tree_id) = tree_id {
        let nodes = store.list_tree_nodes(&tree_id).await?;
        debug!(
            "seeded {} values and {} labels for submission {}",
            values.len(),
            nodes.len(),
            submission_id
        );
        for node in nodes {
            ctx.seed_label(&node.id, &node.label);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use optrace_storage::{InMemoryRuleStore, RuleBaseDocument};

    fn store() -> InMemoryRuleStore {
        let doc = RuleBaseDocument::from_value(serde_json::json!({
            "nodes": [
                {"id": "price", "tree_id": "t", "label": "Price", "field_label": "Unit price"},
                {"id": "volume", "tree_id": "t", "label": "Volume", "calculated_value": "12"},
                {"id": "shared", "tree_id": "t", "label": "Shared", "shared_reference_name": "Ref name"},
                {"id": "empty", "tree_id": "t", "label": "Empty"}
            ],
            "submissions": [{"id": "s", "tree_id": "t"}],
            "submission_values": [
                {"submission_id": "s", "node_id": "price", "value": "1250"},
                {"submission_id": "s", "node_id": "tags", "value": "[\"a\",\"b\"]"},
                {"submission_id": "s", "node_id": "cleared", "value": "null"}
            ]
        }))
        .unwrap();
        InMemoryRuleStore::from_document(doc).unwrap()
    }

    #[test]
    fn renders_json_shapes() {
        assert_eq!(render_json(&serde_json::json!("x")), "x");
        assert_eq!(render_json(&serde_json::json!(2.5)), "2.5");
        assert_eq!(render_json(&serde_json::json!(true)), "true");
        assert_eq!(render_json(&serde_json::json!(["a", 1])), "a,1");
        assert_eq!(render_json(&serde_json::json!({"k": 1})), "{\"k\":1}");
        assert_eq!(render_json(&serde_json::Value::Null), "");
    }

    #[tokio::test]
    async fn value_priority() {
        let s = store();
        let mut ctx = EvalContext::new("s");
        assert_eq!(node_value(&s, &ctx, "price", false).await.unwrap(), "1250");
        assert_eq!(node_value(&s, &ctx, "volume", false).await.unwrap(), "12");
        assert_eq!(node_value(&s, &ctx, "empty", false).await.unwrap(), "0");
        assert_eq!(node_value(&s, &ctx, "empty", true).await.unwrap(), "");

        ctx.set_value("price", serde_json::json!(7));
        assert_eq!(node_value(&s, &ctx, "price", false).await.unwrap(), "7");
        ctx.set_value("price", serde_json::Value::Null);
        assert_eq!(node_value(&s, &ctx, "price", true).await.unwrap(), "");
    }

    #[tokio::test]
    async fn label_priority() {
        let s = store();
        let mut ctx = EvalContext::new("s");
        assert_eq!(node_label(&s, &ctx, "shared").await.unwrap(), "Ref name");
        assert_eq!(node_label(&s, &ctx, "price").await.unwrap(), "Unit price");
        assert_eq!(node_label(&s, &ctx, "volume").await.unwrap(), "Volume");
        assert_eq!(node_label(&s, &ctx, "ghost").await.unwrap(), "Unknown");
        ctx.set_label("price", "Override");
        assert_eq!(node_label(&s, &ctx, "price").await.unwrap(), "Override");
    }

    #[tokio::test]
    async fn seeding_decodes_values_and_keeps_overrides() {
        let s = store();
        let mut ctx = EvalContext::new("s");
        ctx.set_value("price", serde_json::json!("10"));
        seed_context(&s, &mut ctx).await.unwrap();

        assert_eq!(ctx.value("price"), Some(&serde_json::json!("10")));
        assert_eq!(ctx.value("tags"), Some(&serde_json::json!(["a", "b"])));
        assert!(ctx.value("cleared").is_none());
        assert_eq!(ctx.label("volume"), Some("Volume"));
        assert_eq!(node_value(&s, &ctx, "tags", false).await.unwrap(), "a,b");
    }
}
