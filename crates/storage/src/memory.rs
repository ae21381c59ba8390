//! In-memory `RuleStore` backend.
//!
//! Built once from a [`RuleBaseDocument`] and read-only afterwards, which
//! makes every read trivially repeatable within an evaluation.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::document::RuleBaseDocument;
use crate::error::StorageError;
use crate::record::{
    ConditionRecord, FormulaRecord, NodeRecord, SubmissionRecord, SubmissionValueRecord,
    TableRecord, VariableRecord,
};
use crate::traits::RuleStore;

/// A `RuleStore` holding an entire rule base in hash maps.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    nodes: HashMap<String, NodeRecord>,
    /// Node ids in document order, for stable tree listings.
    node_order: Vec<String>,
    variables_by_node: HashMap<String, VariableRecord>,
    formulas: HashMap<String, FormulaRecord>,
    formula_order: Vec<String>,
    conditions: HashMap<String, ConditionRecord>,
    condition_order: Vec<String>,
    tables: HashMap<String, TableRecord>,
    table_order: Vec<String>,
    submissions: HashMap<String, SubmissionRecord>,
    submission_values: Vec<SubmissionValueRecord>,
}

impl InMemoryRuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a document, rejecting duplicate ids.
    pub fn from_document(doc: RuleBaseDocument) -> Result<Self, StorageError> {
        let mut store = Self::new();
        for node in doc.nodes {
            store.insert_node(node)?;
        }
        for variable in doc.variables {
            store.insert_variable(variable)?;
        }
        for formula in doc.formulas {
            store.insert_formula(formula)?;
        }
        for condition in doc.conditions {
            store.insert_condition(condition)?;
        }
        for table in doc.tables {
            store.insert_table(table)?;
        }
        for submission in doc.submissions {
            store.insert_submission(submission)?;
        }
        for value in doc.submission_values {
            store.upsert_submission_value(value);
        }
        Ok(store)
    }

    pub fn insert_node(&mut self, node: NodeRecord) -> Result<(), StorageError> {
        if self.nodes.contains_key(&node.id) {
            return Err(StorageError::DuplicateRecord {
                collection: "node",
                id: node.id,
            });
        }
        self.node_order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn insert_variable(&mut self, variable: VariableRecord) -> Result<(), StorageError> {
        if self.variables_by_node.contains_key(&variable.node_id) {
            return Err(StorageError::DuplicateRecord {
                collection: "variable",
                id: variable.node_id,
            });
        }
        self.variables_by_node
            .insert(variable.node_id.clone(), variable);
        Ok(())
    }

    pub fn insert_formula(&mut self, formula: FormulaRecord) -> Result<(), StorageError> {
        if self.formulas.contains_key(&formula.id) {
            return Err(StorageError::DuplicateRecord {
                collection: "formula",
                id: formula.id,
            });
        }
        self.formula_order.push(formula.id.clone());
        self.formulas.insert(formula.id.clone(), formula);
        Ok(())
    }

    pub fn insert_condition(&mut self, condition: ConditionRecord) -> Result<(), StorageError> {
        if self.conditions.contains_key(&condition.id) {
            return Err(StorageError::DuplicateRecord {
                collection: "condition",
                id: condition.id,
            });
        }
        self.condition_order.push(condition.id.clone());
        self.conditions.insert(condition.id.clone(), condition);
        Ok(())
    }

    /// Insert a table. Columns and rows are sorted by index on the way in.
    pub fn insert_table(&mut self, mut table: TableRecord) -> Result<(), StorageError> {
        if self.tables.contains_key(&table.id) {
            return Err(StorageError::DuplicateRecord {
                collection: "table",
                id: table.id,
            });
        }
        table.columns.sort_by_key(|c| c.column_index);
        table.rows.sort_by_key(|r| r.row_index);
        self.table_order.push(table.id.clone());
        self.tables.insert(table.id.clone(), table);
        Ok(())
    }

    pub fn insert_submission(&mut self, submission: SubmissionRecord) -> Result<(), StorageError> {
        if self.submissions.contains_key(&submission.id) {
            return Err(StorageError::DuplicateRecord {
                collection: "submission",
                id: submission.id,
            });
        }
        self.submissions.insert(submission.id.clone(), submission);
        Ok(())
    }

    /// Insert or replace the value of (submission, node).
    pub fn upsert_submission_value(&mut self, value: SubmissionValueRecord) {
        match self
            .submission_values
            .iter_mut()
            .find(|v| v.submission_id == value.submission_id && v.node_id == value.node_id)
        {
            Some(existing) => *existing = value,
            None => self.submission_values.push(value),
        }
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<OffsetDateTime> {
    raw.and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}

/// Default tables first, then newest `updated_at` first. Missing or
/// unparsable timestamps sort last.
fn node_table_order(a: &TableRecord, b: &TableRecord) -> Ordering {
    b.is_default.cmp(&a.is_default).then_with(|| {
        let ta = parse_timestamp(a.updated_at.as_deref());
        let tb = parse_timestamp(b.updated_at.as_deref());
        tb.cmp(&ta)
    })
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn get_node(&self, node_id: &str) -> Result<Option<NodeRecord>, StorageError> {
        Ok(self.nodes.get(node_id).cloned())
    }

    async fn list_tree_nodes(&self, tree_id: &str) -> Result<Vec<NodeRecord>, StorageError> {
        Ok(self
            .node_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.tree_id == tree_id)
            .cloned()
            .collect())
    }

    async fn get_variable_by_node(
        &self,
        node_id: &str,
    ) -> Result<Option<VariableRecord>, StorageError> {
        Ok(self.variables_by_node.get(node_id).cloned())
    }

    async fn get_formula(&self, formula_id: &str) -> Result<Option<FormulaRecord>, StorageError> {
        Ok(self.formulas.get(formula_id).cloned())
    }

    async fn find_node_formula(
        &self,
        node_id: &str,
    ) -> Result<Option<FormulaRecord>, StorageError> {
        let mut attached: Vec<&FormulaRecord> = self
            .formula_order
            .iter()
            .filter_map(|id| self.formulas.get(id))
            .filter(|f| f.node_id == node_id)
            .collect();
        // Stable sort keeps document order among equals.
        attached.sort_by(|a, b| b.is_default.cmp(&a.is_default));
        Ok(attached.first().map(|f| (*f).clone()))
    }

    async fn get_condition(
        &self,
        condition_id: &str,
    ) -> Result<Option<ConditionRecord>, StorageError> {
        Ok(self.conditions.get(condition_id).cloned())
    }

    async fn find_node_condition(
        &self,
        node_id: &str,
    ) -> Result<Option<ConditionRecord>, StorageError> {
        Ok(self
            .condition_order
            .iter()
            .filter_map(|id| self.conditions.get(id))
            .find(|c| c.node_id == node_id)
            .cloned())
    }

    async fn get_table(&self, table_id: &str) -> Result<Option<TableRecord>, StorageError> {
        Ok(self.tables.get(table_id).cloned())
    }

    async fn find_node_table(&self, node_id: &str) -> Result<Option<TableRecord>, StorageError> {
        let mut attached: Vec<&TableRecord> = self
            .table_order
            .iter()
            .filter_map(|id| self.tables.get(id))
            .filter(|t| t.node_id == node_id)
            .collect();
        attached.sort_by(|a, b| node_table_order(a, b));
        Ok(attached.first().map(|t| (*t).clone()))
    }

    async fn get_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<SubmissionRecord>, StorageError> {
        Ok(self.submissions.get(submission_id).cloned())
    }

    async fn get_submission_value(
        &self,
        submission_id: &str,
        node_id: &str,
    ) -> Result<Option<SubmissionValueRecord>, StorageError> {
        Ok(self
            .submission_values
            .iter()
            .find(|v| v.submission_id == submission_id && v.node_id == node_id)
            .cloned())
    }

    async fn list_submission_values(
        &self,
        submission_id: &str,
    ) -> Result<Vec<SubmissionValueRecord>, StorageError> {
        Ok(self
            .submission_values
            .iter()
            .filter(|v| v.submission_id == submission_id)
            .cloned()
            .collect())
    }
}
