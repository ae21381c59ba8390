use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{
    ConditionRecord, FormulaRecord, NodeRecord, SubmissionRecord, SubmissionValueRecord,
    TableRecord, VariableRecord,
};

/// Read access to a rule base and its submissions.
///
/// The interpreter never writes through this trait. Every method is a
/// point read or a bulk read; absence is `Ok(None)` (or an empty `Vec`),
/// never an error. Errors are reserved for backend failures, which the
/// interpreter propagates to its caller untouched.
///
/// ## Repeatable reads
///
/// One evaluation may read the same record several times. Implementations
/// must return the same data for the lifetime of an evaluation; conflicting
/// writes are serialized outside this trait.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so that several
/// evaluations can share one store across async tasks.
#[async_trait]
pub trait RuleStore: Send + Sync + 'static {
    // ── Tree ─────────────────────────────────────────────────────────────────

    /// Read a node by id.
    async fn get_node(&self, node_id: &str) -> Result<Option<NodeRecord>, StorageError>;

    /// Read every node of a tree, in storage order.
    async fn list_tree_nodes(&self, tree_id: &str) -> Result<Vec<NodeRecord>, StorageError>;

    /// Read the variable exposed by a node.
    async fn get_variable_by_node(
        &self,
        node_id: &str,
    ) -> Result<Option<VariableRecord>, StorageError>;

    // ── Capabilities ─────────────────────────────────────────────────────────

    /// Read a formula by its own id.
    async fn get_formula(&self, formula_id: &str) -> Result<Option<FormulaRecord>, StorageError>;

    /// Read the formula attached to a node, preferring the one flagged default.
    async fn find_node_formula(
        &self,
        node_id: &str,
    ) -> Result<Option<FormulaRecord>, StorageError>;

    /// Read a condition by its own id.
    async fn get_condition(
        &self,
        condition_id: &str,
    ) -> Result<Option<ConditionRecord>, StorageError>;

    /// Read the first condition attached to a node, in storage order.
    async fn find_node_condition(
        &self,
        node_id: &str,
    ) -> Result<Option<ConditionRecord>, StorageError>;

    /// Read a table by its own id, with columns and rows in index order.
    async fn get_table(&self, table_id: &str) -> Result<Option<TableRecord>, StorageError>;

    /// Read the table attached to a node: default first, then the most
    /// recently updated. Columns and rows in index order.
    async fn find_node_table(&self, node_id: &str) -> Result<Option<TableRecord>, StorageError>;

    // ── Submissions ──────────────────────────────────────────────────────────

    /// Read a submission header.
    async fn get_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<SubmissionRecord>, StorageError>;

    /// Read the persisted value of one node in one submission.
    async fn get_submission_value(
        &self,
        submission_id: &str,
        node_id: &str,
    ) -> Result<Option<SubmissionValueRecord>, StorageError>;

    /// Read every persisted value of a submission, in storage order.
    async fn list_submission_values(
        &self,
        submission_id: &str,
    ) -> Result<Vec<SubmissionValueRecord>, StorageError>;
}
