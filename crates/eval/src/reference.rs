//! Reference classification.
//!
//! A reference is a string naming one rule-base entity. Classification is
//! a pure function of the text: an explicit prefix fixes the kind, anything
//! else is a bare identifier that defaults to [`RefKind::Field`] and may be
//! reclassified later from the node's declared kind.

use std::fmt;

use serde::Serialize;

/// Closed set of reference kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RefKind {
    Field,
    Formula,
    Condition,
    Table,
    #[serde(rename = "fixed")]
    FixedValue,
}

impl RefKind {
    /// Source-kind tag used in evaluation envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Field => "field",
            RefKind::Formula => "formula",
            RefKind::Condition => "condition",
            RefKind::Table => "table",
            RefKind::FixedValue => "fixed",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The text as written.
    pub raw: String,
    /// Normalized identifier: wrapper and prefixes stripped.
    pub id: String,
    pub kind: RefKind,
    /// True when a prefix determined the kind.
    pub explicit: bool,
    /// True for `@select.<optionId>` option references.
    pub option: bool,
}

// Longest prefixes first: `@value.node-formula:` must win over `@value.`.
const PREFIXES: &[(&str, RefKind)] = &[
    ("@value.node-condition:", RefKind::Condition),
    ("@value.condition:", RefKind::Condition),
    ("@value.node-formula:", RefKind::Formula),
    ("@value.formula:", RefKind::Formula),
    ("@value.node-table:", RefKind::Table),
    ("@value.table:", RefKind::Table),
    ("@condition.", RefKind::Condition),
    ("@table.", RefKind::Table),
    ("@fixed.", RefKind::FixedValue),
    ("@calculated.", RefKind::Field),
    ("@value.", RefKind::Field),
    ("node-condition:", RefKind::Condition),
    ("condition:", RefKind::Condition),
    ("node-formula:", RefKind::Formula),
    ("formula:", RefKind::Formula),
    ("node-table:", RefKind::Table),
    ("table:", RefKind::Table),
];

const SELECT_PREFIX: &str = "@select.";

/// Strip an optional `{{ ... }}` wrapper.
fn unwrap_braces(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed
        .strip_prefix("{{")
        .and_then(|inner| inner.strip_suffix("}}"))
    {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

/// Classify a reference string.
pub fn parse_reference(raw: &str) -> Reference {
    let body = unwrap_braces(raw);

    if let Some(rest) = body.strip_prefix(SELECT_PREFIX) {
        // `@select.<optionId>.<suffix>` addresses the option node itself.
        let id = rest.split('.').next().unwrap_or(rest).trim();
        return Reference {
            raw: raw.to_string(),
            id: id.to_string(),
            kind: RefKind::Field,
            explicit: true,
            option: true,
        };
    }

    for (prefix, kind) in PREFIXES {
        if let Some(rest) = body.strip_prefix(prefix) {
            return Reference {
                raw: raw.to_string(),
                id: rest.trim().to_string(),
                kind: *kind,
                explicit: true,
                option: false,
            };
        }
    }

    Reference {
        raw: raw.to_string(),
        id: body.to_string(),
        kind: RefKind::Field,
        explicit: false,
        option: false,
    }
}

/// Normalized identifier of a reference (memo key).
pub fn normalize(raw: &str) -> String {
    parse_reference(raw).id
}

/// Kind implied by a node's declared type, for bare identifiers.
pub fn kind_from_node_kind(node_kind: &str) -> Option<RefKind> {
    match node_kind {
        "condition" => Some(RefKind::Condition),
        "node_formula" => Some(RefKind::Formula),
        "node_table" => Some(RefKind::Table),
        _ => None,
    }
}

/// Field nodes of these types resolve through the table attached to them.
pub fn is_table_backed_field(node_kind: &str) -> bool {
    node_kind.starts_with("leaf_table_") || node_kind.contains("table")
}

fn is_uuid(text: &str) -> bool {
    let groups: Vec<&str> = text.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, n)| g.len() == n && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Whether a formula token names an entity rather than being a literal.
///
/// Prefixed forms always do; bare identifiers only when they match a
/// generated-id (`node_...`), shared-reference (`shared-ref-...`) or UUID
/// shape.
pub fn looks_like_reference(token: &str) -> bool {
    let parsed = parse_reference(token);
    if parsed.id.is_empty() {
        return false;
    }
    parsed.explicit
        || parsed.id.starts_with("node_")
        || parsed.id.starts_with("shared-ref-")
        || is_uuid(&parsed.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_fix_the_kind() {
        let cases = [
            ("@value.condition:c1", RefKind::Condition, "c1"),
            ("node-condition:c1", RefKind::Condition, "c1"),
            ("@condition.c1", RefKind::Condition, "c1"),
            ("@value.node-formula:f1", RefKind::Formula, "f1"),
            ("formula:f1", RefKind::Formula, "f1"),
            ("@table.t1", RefKind::Table, "t1"),
            ("table:t1", RefKind::Table, "t1"),
            ("@value.n1", RefKind::Field, "n1"),
            ("@calculated.n1", RefKind::Field, "n1"),
            ("@fixed.42", RefKind::FixedValue, "42"),
        ];
        for (raw, kind, id) in cases {
            let r = parse_reference(raw);
            assert_eq!(r.kind, kind, "{}", raw);
            assert_eq!(r.id, id, "{}", raw);
            assert!(r.explicit, "{}", raw);
        }
    }

    #[test]
    fn wrapper_braces_are_stripped() {
        let r = parse_reference("{{ @value.node-table:t9 }}");
        assert_eq!(r.kind, RefKind::Table);
        assert_eq!(r.id, "t9");
    }

    #[test]
    fn bare_identifier_defaults_to_field() {
        let r = parse_reference("node_1757366229534_x6jxzmvmu");
        assert_eq!(r.kind, RefKind::Field);
        assert!(!r.explicit);
        assert_eq!(normalize(" plain "), "plain");
    }

    #[test]
    fn select_option_drops_suffix() {
        let r = parse_reference("@select.opt-7.label");
        assert!(r.option);
        assert_eq!(r.id, "opt-7");
    }

    #[test]
    fn formula_token_shapes() {
        assert!(looks_like_reference("@value.price"));
        assert!(looks_like_reference("node_123_abc"));
        assert!(looks_like_reference("shared-ref-42"));
        assert!(looks_like_reference("702d1b09-abc9-4096-9aaa-77155ac5294f"));
        assert!(!looks_like_reference("+"));
        assert!(!looks_like_reference("12.5"));
        assert!(!looks_like_reference("price"));
    }

    #[test]
    fn node_kinds_reclassify() {
        assert_eq!(kind_from_node_kind("condition"), Some(RefKind::Condition));
        assert_eq!(kind_from_node_kind("node_table"), Some(RefKind::Table));
        assert_eq!(kind_from_node_kind("leaf_field"), None);
        assert!(is_table_backed_field("leaf_table_lookup"));
        assert!(!is_table_backed_field("leaf_field"));
    }
}
