//! The reference dispatcher.
//!
//! [`Interpreter::interpret`] is the recursive entry point every resolver
//! calls back into. It enforces the depth limit, serves the memo table,
//! classifies the reference and downgrades resolver failures into sentinel
//! results. Only store failures propagate.

use std::future::Future;
use std::pin::Pin;

use log::{debug, warn};
use optrace_storage::{RuleStore, StorageError};

use crate::accessor;
use crate::config::EvalOptions;
use crate::context::EvalContext;
use crate::reference::{
    is_table_backed_field, kind_from_node_kind, parse_reference, RefKind, Reference,
};
use crate::types::{Failure, InterpretResult, ResolveError, TraceDetails, EMPTY_SENTINEL};

/// Boxed future returned by the recursive dispatcher.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resolves references against one store with fixed options.
pub struct Interpreter<'s, S: RuleStore + ?Sized> {
    store: &'s S,
    options: EvalOptions,
}

impl<'s, S: RuleStore + ?Sized> Interpreter<'s, S> {
    pub fn new(store: &'s S, options: EvalOptions) -> Self {
        Interpreter { store, options }
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Resolve `reference` to a value and explanation.
    ///
    /// `known_kind` overrides node-kind reclassification of bare
    /// identifiers; explicit prefixes always win.
    pub fn interpret<'a>(
        &'a self,
        reference: &'a str,
        ctx: &'a mut EvalContext,
        depth: usize,
        known_kind: Option<RefKind>,
    ) -> BoxFuture<'a, Result<InterpretResult, StorageError>> {
        Box::pin(async move {
            let parsed = parse_reference(reference);

            if depth > self.options.max_depth {
                warn!("recursion too deep (depth={}) for {}", depth, reference);
                return Ok(InterpretResult::failure(
                    &parsed.id,
                    ResolveError::RecursionLimitExceeded { depth },
                ));
            }

            let kind = self.classify(&parsed, known_kind).await?;

            if let Some(hit) = ctx.memoized(kind, &parsed.id) {
                debug!("memo hit for {} {}", kind, parsed.id);
                let hit = hit.clone();
                ctx.log_mut().record_memo_hit();
                return Ok(hit);
            }
            debug!("resolving {} as {} (depth={})", parsed.id, kind, depth);

            let outcome = match kind {
                RefKind::Field => self.resolve_field(&parsed.id, ctx, depth).await,
                RefKind::Formula => self.resolve_formula(&parsed.id, ctx, depth).await,
                RefKind::Condition => self.resolve_condition(&parsed.id, ctx, depth).await,
                RefKind::Table => self.resolve_table(&parsed.id, ctx, depth).await,
                RefKind::FixedValue => Ok(fixed_result(&parsed.id)),
            };

            let result = match outcome {
                Ok(result) => result,
                Err(Failure::Resolve(e)) => {
                    warn!("{} degraded to sentinel: {}", parsed.id, e);
                    InterpretResult::failure(&parsed.id, e)
                }
                Err(Failure::Store(e)) => return Err(e),
            };

            ctx.log_mut().record_resolution(&parsed.id, kind);
            ctx.memoize(kind, parsed.id.clone(), result.clone());
            Ok(result)
        })
    }

    /// Kind of a parsed reference: explicit prefix, then caller kind, then
    /// the node's declared type, then field.
    async fn classify(
        &self,
        parsed: &Reference,
        known_kind: Option<RefKind>,
    ) -> Result<RefKind, StorageError> {
        if parsed.explicit {
            return Ok(parsed.kind);
        }
        if let Some(kind) = known_kind {
            return Ok(kind);
        }
        let declared = self
            .store
            .get_node(&parsed.id)
            .await?
            .and_then(|node| kind_from_node_kind(&node.kind));
        Ok(declared.unwrap_or(RefKind::Field))
    }

    /// A plain field: its value and label. Fields backed by a table node
    /// resolve through that table.
    async fn resolve_field(
        &self,
        node_id: &str,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        if let Some(node) = self.store.get_node(node_id).await? {
            if is_table_backed_field(&node.kind) {
                return self.resolve_table(node_id, ctx, depth).await;
            }
        }
        let value = accessor::node_value(self.store, ctx, node_id, false).await?;
        let label = accessor::node_label(self.store, ctx, node_id).await?;
        Ok(InterpretResult::new(
            value.clone(),
            format!("{}({})", label, value),
            TraceDetails::Field {
                node_id: node_id.to_string(),
                label,
                value,
            },
        ))
    }
}

pub(crate) fn fixed_result(literal: &str) -> InterpretResult {
    let value = if literal.is_empty() {
        EMPTY_SENTINEL
    } else {
        literal
    };
    InterpretResult::new(
        value,
        format!("Fixed value: {}", value),
        TraceDetails::Fixed {
            value: value.to_string(),
        },
    )
}
