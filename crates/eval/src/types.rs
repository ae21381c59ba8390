//! Result, trace and error types shared by every resolver.

use std::fmt;

use optrace_storage::StorageError;
use serde::Serialize;

use crate::reference::RefKind;

/// Canonical "no value" marker.
pub const EMPTY_SENTINEL: &str = "∅";

// ──────────────────────────────────────────────
// Interpretation results
// ──────────────────────────────────────────────

/// The outcome of resolving one reference: a textual value, a rendered
/// explanation, and a typed trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretResult {
    pub result: String,
    pub human_text: String,
    pub details: TraceDetails,
}

impl InterpretResult {
    pub fn new(result: impl Into<String>, human_text: impl Into<String>, details: TraceDetails) -> Self {
        InterpretResult {
            result: result.into(),
            human_text: human_text.into(),
            details,
        }
    }

    /// Sentinel result carrying a typed failure.
    pub fn failure(reference: &str, error: ResolveError) -> Self {
        InterpretResult {
            result: EMPTY_SENTINEL.to_string(),
            human_text: error.to_string(),
            details: TraceDetails::Failure {
                reference: reference.to_string(),
                category: error.category(),
                error,
            },
        }
    }

    /// True when the result is the "no value" sentinel.
    pub fn is_empty_sentinel(&self) -> bool {
        self.result == EMPTY_SENTINEL
    }
}

/// Which side of a condition produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Then,
    Else,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Then => "THEN",
            Branch::Else => "ELSE",
        }
    }
}

/// One operand of a condition's when-clause, as it was resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperandTrace {
    pub label: String,
    /// `None` when the operand resolved to nothing.
    pub value: Option<String>,
}

/// A placeholder of a formula and the number it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaVariable {
    pub placeholder: String,
    pub reference: String,
    pub label: String,
    pub value: String,
}

/// Active table lookup mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupMode {
    ColumnFixed,
    RowFixed,
    Crossing,
}

/// A selector as used by a table lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorTrace {
    pub label: String,
    pub value: String,
}

/// One cell returned by a table lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTrace {
    /// The display header (column or row) the value was read for.
    pub header: String,
    pub value: String,
}

/// Typed trace record, one shape per resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TraceDetails {
    #[serde(rename_all = "camelCase")]
    Field {
        node_id: String,
        label: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    Formula {
        formula_id: String,
        formula_name: String,
        expression: String,
        human_expression: String,
        variables: Vec<FormulaVariable>,
        /// Non-fatal evaluator codes (`division_by_zero`, ...).
        issues: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Condition {
        condition_id: String,
        condition_name: String,
        operator: String,
        left: OperandTrace,
        right: Option<OperandTrace>,
        outcome: bool,
        branch_used: Branch,
        /// `None` when the branch was skipped under lazy resolution.
        then_result: Option<Box<InterpretResult>>,
        else_result: Option<Box<InterpretResult>>,
    },
    #[serde(rename_all = "camelCase")]
    Table {
        table_id: String,
        table_name: String,
        mode: LookupMode,
        row: Option<SelectorTrace>,
        column: Option<SelectorTrace>,
        cells: Vec<CellTrace>,
    },
    Fixed {
        value: String,
    },
    Default {
        value: Option<String>,
    },
    NoAction,
    Failure {
        reference: String,
        category: ErrorCategory,
        error: ResolveError,
    },
}

impl TraceDetails {
    /// Display name of the resolved entity, for operand labels.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            TraceDetails::Condition { condition_name, .. } => Some(condition_name),
            TraceDetails::Formula { formula_name, .. } => Some(formula_name),
            TraceDetails::Table { table_name, .. } => Some(table_name),
            TraceDetails::Field { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TraceDetails::Failure { .. })
    }
}

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Coarse failure taxonomy reported alongside every typed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    NotFound,
    InvalidConfiguration,
    RecursionLimitExceeded,
    EvaluationFailure,
}

/// A resolver failure. Never escapes the dispatcher: it becomes a
/// sentinel result with this error in its trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum ResolveError {
    /// The referenced entity does not exist.
    NotFound { kind: RefKind, id: String },
    /// A condition set has no when-clause.
    MissingWhen { condition_id: String },
    /// A condition set has the wrong shape.
    InvalidCondition { condition_id: String, message: String },
    /// The table has no active lookup.
    LookupNotEnabled { table_id: String },
    /// The lookup configuration matches no mode or has the wrong shape.
    InvalidLookupConfig { table_id: String, message: String },
    /// Column-fixed lookup without a column selector value.
    NoColumnSelection { table_id: String },
    /// Row-fixed lookup without a row selector value.
    NoRowSelection { table_id: String },
    /// Crossing lookup missing one or both selector values.
    MissingSelection {
        table_id: String,
        row: Option<String>,
        column: Option<String>,
    },
    /// Selectors matched no header.
    ValueNotFound {
        table_id: String,
        row: String,
        column: String,
    },
    /// Matched headers point outside the cell matrix.
    IndexOutOfBounds {
        table_id: String,
        row: String,
        column: String,
    },
    /// The reference chain is deeper than the configured limit.
    RecursionLimitExceeded { depth: usize },
    /// A token stream or expression could not be evaluated.
    EvaluationFailure { message: String },
}

impl ResolveError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolveError::NotFound { .. } | ResolveError::ValueNotFound { .. } => {
                ErrorCategory::NotFound
            }
            ResolveError::MissingWhen { .. }
            | ResolveError::InvalidCondition { .. }
            | ResolveError::LookupNotEnabled { .. }
            | ResolveError::InvalidLookupConfig { .. }
            | ResolveError::NoColumnSelection { .. }
            | ResolveError::NoRowSelection { .. }
            | ResolveError::MissingSelection { .. } => ErrorCategory::InvalidConfiguration,
            ResolveError::RecursionLimitExceeded { .. } => ErrorCategory::RecursionLimitExceeded,
            ResolveError::IndexOutOfBounds { .. } | ResolveError::EvaluationFailure { .. } => {
                ErrorCategory::EvaluationFailure
            }
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            ResolveError::MissingWhen { condition_id } => {
                write!(f, "condition '{}' has no when-clause", condition_id)
            }
            ResolveError::InvalidCondition {
                condition_id,
                message,
            } => write!(f, "invalid condition '{}': {}", condition_id, message),
            ResolveError::LookupNotEnabled { table_id } => {
                write!(f, "lookup not enabled for table '{}'", table_id)
            }
            ResolveError::InvalidLookupConfig { table_id, message } => {
                write!(f, "invalid lookup configuration for table '{}': {}", table_id, message)
            }
            ResolveError::NoColumnSelection { table_id } => {
                write!(f, "table '{}': no column selection", table_id)
            }
            ResolveError::NoRowSelection { table_id } => {
                write!(f, "table '{}': no row selection", table_id)
            }
            ResolveError::MissingSelection {
                table_id,
                row,
                column,
            } => write!(
                f,
                "table '{}': missing selection (row={}, column={})",
                table_id,
                row.as_deref().unwrap_or("?"),
                column.as_deref().unwrap_or("?")
            ),
            ResolveError::ValueNotFound {
                table_id,
                row,
                column,
            } => write!(f, "table '{}'[{}, {}]: value not found", table_id, row, column),
            ResolveError::IndexOutOfBounds {
                table_id,
                row,
                column,
            } => write!(f, "table '{}'[{}, {}]: index out of bounds", table_id, row, column),
            ResolveError::RecursionLimitExceeded { depth } => {
                write!(f, "recursion too deep (depth {})", depth)
            }
            ResolveError::EvaluationFailure { message } => {
                write!(f, "evaluation failed: {}", message)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Errors returned to the caller of [`crate::evaluate`].
#[derive(Debug)]
pub enum EvalError {
    /// The node exposes no variable.
    VariableNotFound { node_id: String },
    /// The record store failed; passed through untouched.
    Storage(StorageError),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::VariableNotFound { node_id } => {
                write!(f, "no variable exposed by node '{}'", node_id)
            }
            EvalError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvalError::Storage(e) => Some(e),
            EvalError::VariableNotFound { .. } => None,
        }
    }
}

impl From<StorageError> for EvalError {
    fn from(e: StorageError) -> Self {
        EvalError::Storage(e)
    }
}

/// An authored JSON structure (token stream, condition set, lookup
/// configuration) that does not have the expected shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A string field that should hold JSON does not parse.
    InvalidJson { path: String, message: String },
    /// A value has the wrong JSON type.
    WrongShape { path: String, expected: &'static str },
    /// A required value is absent.
    Missing { path: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidJson { path, message } => {
                write!(f, "{}: invalid JSON ({})", path, message)
            }
            ConfigError::WrongShape { path, expected } => {
                write!(f, "{}: expected {}", path, expected)
            }
            ConfigError::Missing { path } => write!(f, "{}: missing", path),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Decode a JSON value that may have been stored as a JSON string.
pub(crate) fn decode_embedded(value: &serde_json::Value, path: &str) -> Result<serde_json::Value, ConfigError> {
    match value {
        serde_json::Value::String(text) => {
            serde_json::from_str(text).map_err(|e| ConfigError::InvalidJson {
                path: path.to_string(),
                message: e.to_string(),
            })
        }
        other => Ok(other.clone()),
    }
}

/// Internal resolver outcome: a typed failure to downgrade into a sentinel,
/// or a store failure to propagate.
#[derive(Debug)]
pub(crate) enum Failure {
    Resolve(ResolveError),
    Store(StorageError),
}

impl From<ResolveError> for Failure {
    fn from(e: ResolveError) -> Self {
        Failure::Resolve(e)
    }
}

impl From<StorageError> for Failure {
    fn from(e: StorageError) -> Self {
        Failure::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_carries_sentinel_and_category() {
        let r = InterpretResult::failure(
            "t-1",
            ResolveError::LookupNotEnabled {
                table_id: "t-1".into(),
            },
        );
        assert!(r.is_empty_sentinel());
        assert_eq!(r.human_text, "lookup not enabled for table 't-1'");
        match r.details {
            TraceDetails::Failure { category, .. } => {
                assert_eq!(category, ErrorCategory::InvalidConfiguration)
            }
            other => panic!("expected failure trace, got {:?}", other),
        }
    }

    #[test]
    fn trace_serializes_with_type_tag() {
        let details = TraceDetails::Fixed { value: "12".into() };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json, serde_json::json!({"type": "fixed", "value": "12"}));
    }

    #[test]
    fn display_name_prefers_entity_names() {
        let details = TraceDetails::Table {
            table_id: "t".into(),
            table_name: "Grid".into(),
            mode: LookupMode::Crossing,
            row: None,
            column: None,
            cells: vec![],
        };
        assert_eq!(details.display_name(), Some("Grid"));
        assert_eq!(TraceDetails::NoAction.display_name(), None);
    }

    #[test]
    fn storage_error_converts_into_eval_error() {
        let err: EvalError = StorageError::Unavailable("down".into()).into();
        assert!(matches!(err, EvalError::Storage(_)));
        assert_eq!(err.to_string(), "storage backend unavailable: down");
    }
}
