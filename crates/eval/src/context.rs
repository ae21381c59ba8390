//! Per-invocation evaluation state.
//!
//! One [`EvalContext`] is built per top-level call and passed by `&mut`
//! through every resolver. It is never shared between invocations.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::reference::RefKind;
use crate::types::InterpretResult;

/// One reference that was actually resolved (not served from the memo).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedReference {
    pub id: String,
    pub kind: RefKind,
}

/// Record of what an invocation resolved, in resolution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionLog {
    pub resolved: Vec<ResolvedReference>,
    pub memo_hits: usize,
}

impl ResolutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an underlying resolution.
    pub fn record_resolution(&mut self, id: &str, kind: RefKind) {
        self.resolved.push(ResolvedReference {
            id: id.to_string(),
            kind,
        });
    }

    /// Record a reference served from the memo table.
    pub fn record_memo_hit(&mut self) {
        self.memo_hits += 1;
    }

    /// How many times `id` was resolved from scratch.
    pub fn resolution_count(&self, id: &str) -> usize {
        self.resolved.iter().filter(|r| r.id == id).count()
    }
}

/// Value overrides, labels, memo table and resolution log of one run.
#[derive(Debug, Clone)]
pub struct EvalContext {
    submission_id: String,
    values: BTreeMap<String, serde_json::Value>,
    labels: HashMap<String, String>,
    memo: HashMap<(RefKind, String), InterpretResult>,
    log: ResolutionLog,
}

impl EvalContext {
    pub fn new(submission_id: impl Into<String>) -> Self {
        EvalContext {
            submission_id: submission_id.into(),
            values: BTreeMap::new(),
            labels: HashMap::new(),
            memo: HashMap::new(),
            log: ResolutionLog::new(),
        }
    }

    /// Start from caller-supplied overrides. Overrides win over anything
    /// seeded later.
    pub fn with_overrides(
        submission_id: impl Into<String>,
        overrides: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        let mut ctx = Self::new(submission_id);
        ctx.values = overrides;
        ctx
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    // ── Values ──────────────────────────────────────────────────────────────

    pub fn value(&self, node_id: &str) -> Option<&serde_json::Value> {
        self.values.get(node_id)
    }

    pub fn set_value(&mut self, node_id: impl Into<String>, value: serde_json::Value) {
        self.values.insert(node_id.into(), value);
    }

    /// Insert only when no value is present yet.
    pub fn seed_value(&mut self, node_id: &str, value: serde_json::Value) {
        if !self.values.contains_key(node_id) {
            self.values.insert(node_id.to_string(), value);
        }
    }

    // ── Labels ──────────────────────────────────────────────────────────────

    pub fn label(&self, node_id: &str) -> Option<&str> {
        self.labels.get(node_id).map(String::as_str)
    }

    pub fn set_label(&mut self, node_id: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(node_id.into(), label.into());
    }

    /// Insert only when no label is present yet.
    pub fn seed_label(&mut self, node_id: &str, label: &str) {
        if !self.labels.contains_key(node_id) {
            self.labels.insert(node_id.to_string(), label.to_string());
        }
    }

    // ── Memo ────────────────────────────────────────────────────────────────

    /// Entries are keyed by kind as well as id: `node-formula:x` and
    /// `@value.x` name different entities.
    pub fn memoized(&self, kind: RefKind, id: &str) -> Option<&InterpretResult> {
        self.memo.get(&(kind, id.to_string()))
    }

    pub fn memoize(&mut self, kind: RefKind, id: impl Into<String>, result: InterpretResult) {
        self.memo.insert((kind, id.into()), result);
    }

    // ── Log ─────────────────────────────────────────────────────────────────

    pub fn log(&self) -> &ResolutionLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ResolutionLog {
        &mut self.log
    }

    pub fn into_log(self) -> ResolutionLog {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TraceDetails;

    #[test]
    fn seeding_never_overwrites() {
        let mut overrides = BTreeMap::new();
        overrides.insert("price".to_string(), serde_json::json!("10"));
        let mut ctx = EvalContext::with_overrides("sub-1", overrides);
        ctx.seed_value("price", serde_json::json!("99"));
        ctx.seed_value("volume", serde_json::json!(5));
        assert_eq!(ctx.value("price"), Some(&serde_json::json!("10")));
        assert_eq!(ctx.value("volume"), Some(&serde_json::json!(5)));

        ctx.set_label("price", "Price");
        ctx.seed_label("price", "Other");
        assert_eq!(ctx.label("price"), Some("Price"));
    }

    #[test]
    fn memo_round_trip() {
        let mut ctx = EvalContext::new("s");
        let r = InterpretResult::new("3", "A(3)", TraceDetails::NoAction);
        ctx.memoize(RefKind::Field, "a", r.clone());
        assert_eq!(ctx.memoized(RefKind::Field, "a"), Some(&r));
        assert!(ctx.memoized(RefKind::Formula, "a").is_none());
        assert!(ctx.memoized(RefKind::Field, "b").is_none());
    }

    #[test]
    fn log_counts_resolutions_and_hits() {
        let mut log = ResolutionLog::new();
        log.record_resolution("a", RefKind::Field);
        log.record_resolution("b", RefKind::Formula);
        log.record_memo_hit();
        assert_eq!(log.resolution_count("a"), 1);
        assert_eq!(log.resolution_count("c"), 0);
        assert_eq!(log.memo_hits, 1);
    }
}
