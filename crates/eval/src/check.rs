//! Static validation of a rule base.
//!
//! Runs every condition set, lookup configuration and formula token stream
//! through the same typed loaders the resolvers use, without evaluating
//! anything. Each entity that would degrade to an invalid-configuration
//! sentinel at evaluation time is reported once.

use std::fmt;

use optrace_storage::RuleBaseDocument;
use serde::Serialize;

use crate::condition::parse_condition_set;
use crate::formula::parse_tokens;
use crate::table::LookupConfig;

/// Kind of entity a [`ConfigIssue`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Formula,
    Condition,
    Table,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Formula => "formula",
            EntityKind::Condition => "condition",
            EntityKind::Table => "table",
        })
    }
}

/// One invalid entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigIssue {
    pub entity: EntityKind,
    pub id: String,
    pub name: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({}): {}", self.entity, self.id, self.name, self.message)
    }
}

/// Check every formula, condition and table of `doc`.
///
/// Tables without any lookup configuration are skipped; a configuration
/// that is present but disabled or matches no lookup mode is reported.
pub fn check_rule_base(doc: &RuleBaseDocument) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    for formula in &doc.formulas {
        if let Err(e) = parse_tokens(&formula.tokens) {
            issues.push(ConfigIssue {
                entity: EntityKind::Formula,
                id: formula.id.clone(),
                name: formula.name.clone(),
                message: e.to_string(),
            });
        }
    }

    for condition in &doc.conditions {
        let message = match parse_condition_set(&condition.condition_set) {
            Err(e) => Some(e.to_string()),
            Ok(set) if set.when.is_none() => Some("no when-clause".to_string()),
            Ok(_) => None,
        };
        if let Some(message) = message {
            issues.push(ConfigIssue {
                entity: EntityKind::Condition,
                id: condition.id.clone(),
                name: condition.name.clone(),
                message,
            });
        }
    }

    for table in &doc.tables {
        let message = match LookupConfig::from_meta(&table.meta) {
            Err(e) => Some(e.to_string()),
            Ok(None) => None,
            Ok(Some(config)) if !config.is_active() => Some("lookup not enabled".to_string()),
            Ok(Some(config)) if config.mode().is_none() => {
                Some("no lookup mode matches the configuration".to_string())
            }
            Ok(Some(_)) => None,
        };
        if let Some(message) = message {
            issues.push(ConfigIssue {
                entity: EntityKind::Table,
                id: table.id.clone(),
                name: table.name.clone(),
                message,
            });
        }
    }

    issues
}
