//! Typed lookup configuration, decoded from `meta.lookup`.

use serde_json::{Map, Value};

use crate::types::{decode_embedded, ConfigError, LookupMode};

/// Where an axis selector value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStrategy {
    /// The value entered in the axis selector field.
    Select,
    /// The value of another field.
    Field { source_field: String },
    /// The resolved result of another capability.
    Capacity { capacity_ref: String },
}

/// Scan a designated column (or row) for the first cell satisfying
/// `operator` against the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub operator: String,
    pub column: String,
}

/// Drop candidate rows whose `column` cell fails `operator` against the
/// resolved `value_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub operator: String,
    pub value_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOption {
    pub strategy: SourceStrategy,
    pub comparison: Option<Comparison>,
    pub filter: Option<RowFilter>,
}

/// Scan for the first cell satisfying `operator` against the resolved
/// `value_ref`, ignoring header labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extract {
    pub value_ref: String,
    pub operator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AxisConfig {
    pub enabled: bool,
    pub field_id: Option<String>,
    pub source: Option<SourceOption>,
    /// Fixed headers to read on the other axis.
    pub display: Vec<String>,
}

impl AxisConfig {
    pub fn strategy(&self) -> &SourceStrategy {
        self.source
            .as_ref()
            .map(|s| &s.strategy)
            .unwrap_or(&SourceStrategy::Select)
    }

    /// Field and capacity sources carry computed values eligible for
    /// nearest matching.
    pub fn is_computed(&self) -> bool {
        !matches!(self.strategy(), SourceStrategy::Select)
    }

    pub fn has_selector(&self) -> bool {
        self.field_id.is_some() || self.is_computed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupConfig {
    pub enabled: bool,
    pub row: AxisConfig,
    pub column: AxisConfig,
    pub extract: Option<Extract>,
}

impl LookupConfig {
    /// Decode `meta.lookup`. `Ok(None)` when the table has no lookup section.
    pub fn from_meta(meta: &Value) -> Result<Option<Self>, ConfigError> {
        let meta = decode_embedded(meta, "meta")?;
        let lookup = match &meta {
            Value::Null => return Ok(None),
            Value::Object(map) => match map.get("lookup") {
                None | Some(Value::Null) => return Ok(None),
                Some(lookup) => lookup,
            },
            _ => {
                return Err(ConfigError::WrongShape {
                    path: "meta".to_string(),
                    expected: "an object",
                })
            }
        };
        let lookup = lookup.as_object().ok_or_else(|| ConfigError::WrongShape {
            path: "lookup".to_string(),
            expected: "an object",
        })?;

        let selectors = match lookup.get("selectors") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(ConfigError::WrongShape {
                    path: "lookup.selectors".to_string(),
                    expected: "an object",
                })
            }
        };
        let selector = |key: &str| {
            selectors
                .and_then(|s| s.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };

        let row = AxisConfig {
            enabled: flag(lookup, "rowLookupEnabled"),
            field_id: selector("rowFieldId"),
            source: source_option(lookup, "rowSourceOption")?,
            display: display_list(lookup, "displayRow")?,
        };
        let column = AxisConfig {
            enabled: flag(lookup, "columnLookupEnabled"),
            field_id: selector("columnFieldId"),
            source: source_option(lookup, "columnSourceOption")?,
            display: display_list(lookup, "displayColumn")?,
        };

        let extract = match (text(lookup, "extractValueRef"), text(lookup, "extractOperator")) {
            (Some(value_ref), Some(operator)) => Some(Extract { value_ref, operator }),
            (Some(_), None) => {
                return Err(ConfigError::Missing {
                    path: "lookup.extractOperator".to_string(),
                })
            }
            _ => None,
        };

        Ok(Some(LookupConfig {
            enabled: flag(lookup, "enabled"),
            row,
            column,
            extract,
        }))
    }

    pub fn is_active(&self) -> bool {
        self.enabled || self.row.enabled || self.column.enabled
    }

    /// The mode this configuration selects, if any. Crossing wins when both
    /// axes are enabled and carry a selector.
    pub fn mode(&self) -> Option<LookupMode> {
        let (row, column) = (&self.row, &self.column);
        if row.enabled && column.enabled && row.has_selector() && column.has_selector() {
            Some(LookupMode::Crossing)
        } else if column.enabled
            && (column.field_id.is_some() || column.source.is_some())
            && !column.display.is_empty()
        {
            Some(LookupMode::ColumnFixed)
        } else if row.enabled && !column.enabled && row.has_selector() && !row.display.is_empty() {
            Some(LookupMode::RowFixed)
        } else {
            None
        }
    }
}

fn flag(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool) == Some(true)
}

/// Non-blank string (or number) under `key`.
fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn display_list(map: &Map<String, Value>, key: &str) -> Result<Vec<String>, ConfigError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(Some(s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .into_iter()
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(ConfigError::WrongShape {
                    path: format!("lookup.{}[]", key),
                    expected: "a header name",
                }),
            })
            .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
            .collect(),
        Some(_) => Err(ConfigError::WrongShape {
            path: format!("lookup.{}", key),
            expected: "a string or an array of strings",
        }),
    }
}

fn source_option(map: &Map<String, Value>, key: &str) -> Result<Option<SourceOption>, ConfigError> {
    let option = match map.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(option)) => option,
        Some(_) => {
            return Err(ConfigError::WrongShape {
                path: format!("lookup.{}", key),
                expected: "an object",
            })
        }
    };
    let required = |field: &str| {
        text(option, field).ok_or_else(|| ConfigError::Missing {
            path: format!("lookup.{}.{}", key, field),
        })
    };

    let strategy = match option.get("type").and_then(Value::as_str) {
        None | Some("select") => SourceStrategy::Select,
        Some("field") => SourceStrategy::Field {
            source_field: required("sourceField")?,
        },
        Some("capacity") => SourceStrategy::Capacity {
            capacity_ref: required("capacityRef")?,
        },
        Some(_) => {
            return Err(ConfigError::WrongShape {
                path: format!("lookup.{}.type", key),
                expected: "select, field or capacity",
            })
        }
    };

    let comparison = match (text(option, "operator"), text(option, "comparisonColumn")) {
        (Some(operator), Some(column)) => Some(Comparison { operator, column }),
        _ => None,
    };
    let filter = match (
        text(option, "filterColumn"),
        text(option, "filterOperator"),
        text(option, "filterValueRef"),
    ) {
        (Some(column), Some(operator), Some(value_ref)) => Some(RowFilter {
            column,
            operator,
            value_ref,
        }),
        _ => None,
    };

    Ok(Some(SourceOption {
        strategy,
        comparison,
        filter,
    }))
}
