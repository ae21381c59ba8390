//! Evaluation options.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a condition resolves both branches or only the selected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchResolution {
    /// Resolve both branches so the explanation covers the untaken side.
    #[default]
    Eager,
    /// Resolve only the branch the operator selects.
    Lazy,
}

/// Tunables for one evaluation. Every field has a default, so a partial
/// TOML table deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Depth beyond which a reference yields the recursion sentinel.
    pub max_depth: usize,
    pub branch_resolution: BranchResolution,
    /// Value substituted for a division by zero.
    pub division_by_zero_value: Decimal,
    /// Longest expression text the evaluator accepts.
    pub max_expression_length: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            max_depth: 10,
            branch_resolution: BranchResolution::Eager,
            division_by_zero_value: Decimal::ZERO,
            max_expression_length: 500,
        }
    }
}
