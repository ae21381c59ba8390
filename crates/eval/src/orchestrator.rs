//! Top-level evaluation of a variable.
//!
//! [`evaluate`] reads the variable exposed by a node, seeds a fresh
//! [`EvalContext`] from the submission and hands the variable's source
//! reference to the dispatcher. The returned [`VariableEvaluation`]
//! carries the value, a normalized source kind, the explanation and the
//! full trace.

use std::collections::BTreeMap;

use log::{debug, info};
use optrace_storage::RuleStore;
use serde::Serialize;

use crate::accessor;
use crate::config::EvalOptions;
use crate::context::{EvalContext, ResolutionLog};
use crate::interpreter::Interpreter;
use crate::reference::{parse_reference, RefKind};
use crate::types::{EvalError, InterpretResult, TraceDetails, EMPTY_SENTINEL};

/// The envelope returned for one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableEvaluation {
    pub value: String,
    pub source_kind: RefKind,
    pub explanation: String,
    pub trace: TraceDetails,
    /// The reference the value was resolved from, if any.
    pub source_ref: Option<String>,
    pub resolution_log: ResolutionLog,
}

/// How a variable obtains its value.
enum Source<'v> {
    Fixed(&'v str),
    Tree(&'v str),
    Formula(&'v str),
    Default(Option<&'v str>),
}

fn source_of(variable: &optrace_storage::VariableRecord) -> Source<'_> {
    let source_ref = variable.source_ref.as_deref().filter(|r| !r.trim().is_empty());
    match (variable.source_type.as_deref(), source_ref) {
        (Some("fixed"), _) if variable.fixed_value.is_some() => {
            Source::Fixed(variable.fixed_value.as_deref().unwrap_or_default())
        }
        (Some("tree"), Some(r)) => Source::Tree(r),
        (Some("formula"), Some(r)) => Source::Formula(r),
        _ => Source::Default(variable.default_value.as_deref()),
    }
}

/// Evaluate the variable exposed by `variable_node_id` for one submission.
///
/// Resolver failures come back as sentinel values inside the envelope;
/// only a missing variable or a store failure is an `Err`.
///
/// # Arguments
/// * `store` - Rule base and submissions to read from
/// * `variable_node_id` - Node exposing the variable
/// * `submission_id` - Submission whose persisted values seed the context
/// * `overrides` - Node id to value map; wins over persisted values
/// * `options` - Depth limit, branch resolution and expression settings
///
/// # Returns
/// * `VariableEvaluation` envelope, or an `EvalError`
pub async fn evaluate<S: RuleStore + ?Sized>(
    store: &S,
    variable_node_id: &str,
    submission_id: &str,
    overrides: BTreeMap<String, serde_json::Value>,
    options: EvalOptions,
) -> Result<VariableEvaluation, EvalError> {
    let variable = store
        .get_variable_by_node(variable_node_id)
        .await?
        .ok_or_else(|| EvalError::VariableNotFound {
            node_id: variable_node_id.to_string(),
        })?;

    let source = source_of(&variable);
    let formula_source = matches!(source, Source::Formula(_));
    match source {
        Source::Fixed(value) => {
            debug!("variable {} is fixed", variable.id);
            Ok(VariableEvaluation {
                value: value.to_string(),
                source_kind: RefKind::FixedValue,
                explanation: format!("Fixed value: {}", value),
                trace: TraceDetails::Fixed {
                    value: value.to_string(),
                },
                source_ref: None,
                resolution_log: ResolutionLog::new(),
            })
        }
        Source::Default(default) => {
            debug!("variable {} has no source, using default", variable.id);
            Ok(VariableEvaluation {
                value: default.unwrap_or(EMPTY_SENTINEL).to_string(),
                source_kind: RefKind::Field,
                explanation: format!("Default value: {}", default.unwrap_or("none")),
                trace: TraceDetails::Default {
                    value: default.map(str::to_string),
                },
                source_ref: None,
                resolution_log: ResolutionLog::new(),
            })
        }
        Source::Tree(reference) | Source::Formula(reference) => {
            let mut ctx = EvalContext::with_overrides(submission_id, overrides);
            accessor::seed_context(store, &mut ctx).await?;

            let interpreter = Interpreter::new(store, options);
            let result = interpreter.interpret(reference, &mut ctx, 0, None).await?;
            let source_kind = if formula_source {
                RefKind::Formula
            } else {
                source_kind_of(reference, &result)
            };
            info!(
                "variable {} = {} ({} resolutions, {} memo hits)",
                variable.id,
                result.result,
                ctx.log().resolved.len(),
                ctx.log().memo_hits
            );
            Ok(VariableEvaluation {
                value: result.result,
                source_kind,
                explanation: result.human_text,
                trace: result.details,
                source_ref: Some(reference.to_string()),
                resolution_log: ctx.into_log(),
            })
        }
    }
}

/// Resolve one reference for a submission outside of any variable.
pub async fn interpret_reference<S: RuleStore + ?Sized>(
    store: &S,
    reference: &str,
    submission_id: &str,
    overrides: BTreeMap<String, serde_json::Value>,
    options: EvalOptions,
) -> Result<InterpretResult, EvalError> {
    let mut ctx = EvalContext::with_overrides(submission_id, overrides);
    accessor::seed_context(store, &mut ctx).await?;
    let interpreter = Interpreter::new(store, options);
    Ok(interpreter.interpret(reference, &mut ctx, 0, None).await?)
}

/// Source kind of a tree reference: what actually resolved it, else what
/// its text says.
fn source_kind_of(reference: &str, result: &InterpretResult) -> RefKind {
    match result.details {
        TraceDetails::Condition { .. } => RefKind::Condition,
        TraceDetails::Formula { .. } => RefKind::Formula,
        TraceDetails::Table { .. } => RefKind::Table,
        TraceDetails::Field { .. } => RefKind::Field,
        _ => parse_reference(reference).kind,
    }
}
