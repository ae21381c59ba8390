//! Rule-base storage for the optrace interpreter.
//!
//! Defines the read-only [`RuleStore`] trait the interpreter consumes, the
//! record types it returns, a JSON [`RuleBaseDocument`] form, and the
//! [`InMemoryRuleStore`] backend. Backends validate themselves with the
//! [`conformance`] suite.

mod document;
mod error;
mod memory;
mod record;
mod traits;

pub mod conformance;

pub use document::RuleBaseDocument;
pub use error::StorageError;
pub use memory::InMemoryRuleStore;
pub use record::{
    ConditionRecord, FormulaRecord, NodeRecord, SubmissionRecord, SubmissionValueRecord,
    TableColumnRecord, TableRecord, TableRowRecord, VariableRecord,
};
pub use traits::RuleStore;
