use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::record::{
    ConditionRecord, FormulaRecord, NodeRecord, SubmissionRecord, SubmissionValueRecord,
    TableRecord, VariableRecord,
};

/// A whole rule base plus its submissions, as one JSON document.
///
/// Every collection is optional in the JSON form. This is the format the
/// CLI loads and the format the conformance suite seeds backends from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBaseDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub variables: Vec<VariableRecord>,
    #[serde(default)]
    pub formulas: Vec<FormulaRecord>,
    #[serde(default)]
    pub conditions: Vec<ConditionRecord>,
    #[serde(default)]
    pub tables: Vec<TableRecord>,
    #[serde(default)]
    pub submissions: Vec<SubmissionRecord>,
    #[serde(default)]
    pub submission_values: Vec<SubmissionValueRecord>,
}

impl RuleBaseDocument {
    /// Decode a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a document from an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_an_empty_document() {
        let doc = RuleBaseDocument::from_json_str("{}").unwrap();
        assert_eq!(doc, RuleBaseDocument::default());
    }

    #[test]
    fn optional_record_fields_default() {
        let doc = RuleBaseDocument::from_value(serde_json::json!({
            "nodes": [{ "id": "n1", "tree_id": "t1" }],
            "tables": [{ "id": "tb1", "node_id": "n1" }]
        }))
        .unwrap();
        assert_eq!(doc.nodes[0].label, "");
        assert!(doc.nodes[0].calculated_value.is_none());
        assert!(!doc.tables[0].is_default);
        assert!(doc.tables[0].rows.is_empty());
    }

    #[test]
    fn malformed_document_is_invalid_document_error() {
        let err = RuleBaseDocument::from_json_str(r#"{"nodes": [{"label": "x"}]}"#).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDocument(_)));
    }
}
