use serde::{Deserialize, Serialize};

/// An addressable unit of the rule tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub tree_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub label: String,
    /// Declared node type (`leaf_field`, `leaf_option`, `condition`,
    /// `node_formula`, `node_table`, `leaf_table_*`, ...).
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub shared_reference_name: Option<String>,
    #[serde(default)]
    pub field_label: Option<String>,
    /// Last value computed for this node by an earlier pass. Read-only here.
    #[serde(default)]
    pub calculated_value: Option<String>,
}

/// The variable exposed by a node, with exactly one active source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub id: String,
    pub node_id: String,
    #[serde(default)]
    pub exposed_key: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// `fixed`, `tree`, `formula`, or absent.
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub fixed_value: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
}

/// A formula capability: an ordered token stream attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaRecord {
    pub id: String,
    pub node_id: String,
    #[serde(default)]
    pub name: String,
    /// JSON array of string or object tokens, kept as authored.
    #[serde(default)]
    pub tokens: serde_json::Value,
    #[serde(default)]
    pub is_default: bool,
}

/// A condition capability. `condition_set` holds the authored branch structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub id: String,
    pub node_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub condition_set: serde_json::Value,
}

/// One column definition of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumnRecord {
    pub column_index: u32,
    pub name: String,
}

/// One stored row of a table. Row 0 is the header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRowRecord {
    pub row_index: u32,
    /// JSON array of cells, or a string holding one.
    #[serde(default)]
    pub cells: serde_json::Value,
}

/// A lookup table capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: String,
    pub node_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    /// ISO 8601 / RFC 3339 timestamp string.
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub columns: Vec<TableColumnRecord>,
    #[serde(default)]
    pub rows: Vec<TableRowRecord>,
    /// Authored metadata; the lookup configuration lives under `lookup`.
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// A submission (one filled-in instance of a tree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    #[serde(default)]
    pub tree_id: Option<String>,
}

/// A persisted field value for one node of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionValueRecord {
    pub submission_id: String,
    pub node_id: String,
    #[serde(default)]
    pub value: Option<String>,
}
