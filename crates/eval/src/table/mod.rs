//! Table lookup engine.
//!
//! A table resolves through its lookup configuration in exactly one of
//! three modes:
//!
//! - **Column-fixed**: a selector picks the row (by extract scan, operator
//!   scan, nearest match, or header matching) and fixed display headers
//!   name the output cells.
//! - **Row-fixed**: the same with the axes swapped.
//! - **Crossing**: two selectors address one cell.
//!
//! Header matching tolerates transposed authoring: a selector that names a
//! row where a column was expected (or the reverse) still finds its cell.

mod config;
mod lookup;
mod matching;
mod model;

pub use config::{
    AxisConfig, Comparison, Extract, LookupConfig, RowFilter, SourceOption, SourceStrategy,
};
pub use matching::{compare_cell, find_header, nearest_match, normalize_header, strip_copy_suffix};
pub use model::TableGrid;

use log::debug;
use optrace_storage::{RuleStore, TableRecord};

use crate::accessor;
use crate::context::EvalContext;
use crate::interpreter::Interpreter;
use crate::reference::{parse_reference, RefKind};
use crate::types::{
    CellTrace, Failure, InterpretResult, LookupMode, ResolveError, SelectorTrace, TraceDetails,
    EMPTY_SENTINEL,
};

/// Everything one lookup reads.
pub(crate) struct Lookup<'t> {
    pub table: &'t TableRecord,
    pub grid: &'t TableGrid,
    pub config: &'t LookupConfig,
}

impl Lookup<'_> {
    fn table_id(&self) -> String {
        self.table.id.clone()
    }

    /// One value renders as text, several as a JSON array.
    fn finish(
        &self,
        mode: LookupMode,
        bracket: String,
        row: Option<SelectorTrace>,
        column: Option<SelectorTrace>,
        cells: Vec<CellTrace>,
    ) -> InterpretResult {
        let result = match cells.as_slice() {
            [single] => single.value.clone(),
            many => serde_json::Value::from(
                many.iter().map(|c| c.value.clone()).collect::<Vec<_>>(),
            )
            .to_string(),
        };
        let rendered = cells
            .iter()
            .map(|c| format!("{}={}", c.header, c.value))
            .collect::<Vec<_>>()
            .join(", ");
        InterpretResult::new(
            result,
            format!("Table \"{}\"[{}] = {}", self.table.name, bracket, rendered),
            TraceDetails::Table {
                table_id: self.table.id.clone(),
                table_name: self.table.name.clone(),
                mode,
                row,
                column,
                cells,
            },
        )
    }
}

impl<'s, S: RuleStore + ?Sized> Interpreter<'s, S> {
    /// Resolve a table by its id, else by the node it is attached to.
    pub(crate) async fn resolve_table(
        &self,
        id: &str,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        let table = match self.store().get_table(id).await? {
            Some(t) => t,
            None => self
                .store()
                .find_node_table(id)
                .await?
                .ok_or_else(|| ResolveError::NotFound {
                    kind: RefKind::Table,
                    id: id.to_string(),
                })?,
        };

        let config = LookupConfig::from_meta(&table.meta).map_err(|e| {
            ResolveError::InvalidLookupConfig {
                table_id: table.id.clone(),
                message: e.to_string(),
            }
        })?;
        let config = match config {
            Some(c) if c.is_active() => c,
            _ => {
                return Err(ResolveError::LookupNotEnabled {
                    table_id: table.id.clone(),
                }
                .into())
            }
        };
        let mode = config
            .mode()
            .ok_or_else(|| ResolveError::InvalidLookupConfig {
                table_id: table.id.clone(),
                message: "no lookup mode matches the enabled axes and selectors".to_string(),
            })?;

        let grid = TableGrid::from_record(&table);
        debug!(
            "table {} ({}x{}) in {:?} mode",
            table.id,
            grid.rows.len(),
            grid.columns.len(),
            mode
        );
        let lookup = Lookup {
            table: &table,
            grid: &grid,
            config: &config,
        };
        match mode {
            LookupMode::ColumnFixed => self.column_fixed(&lookup, ctx, depth).await,
            LookupMode::RowFixed => self.row_fixed(&lookup, ctx, depth).await,
            LookupMode::Crossing => self.crossing(&lookup, ctx, depth).await,
        }
    }

    /// Selector value of an axis; `None` when blank.
    pub(crate) async fn selector_value(
        &self,
        axis: &AxisConfig,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<Option<String>, Failure> {
        let value = match axis.strategy() {
            SourceStrategy::Select => match &axis.field_id {
                Some(field) => accessor::node_value(self.store(), ctx, field, true).await?,
                None => String::new(),
            },
            SourceStrategy::Field { source_field } => {
                accessor::node_value(self.store(), ctx, source_field, true).await?
            }
            SourceStrategy::Capacity { capacity_ref } => {
                self.interpret(capacity_ref, ctx, depth + 1, None)
                    .await?
                    .result
            }
        };
        let value = value.trim();
        Ok(if value.is_empty() || value == EMPTY_SENTINEL {
            None
        } else {
            Some(value.to_string())
        })
    }

    /// Display label of an axis selector.
    pub(crate) async fn selector_label(
        &self,
        axis: &AxisConfig,
        ctx: &EvalContext,
    ) -> Result<String, Failure> {
        Ok(match axis.strategy() {
            SourceStrategy::Select => match &axis.field_id {
                Some(field) => accessor::node_label(self.store(), ctx, field).await?,
                None => "Source".to_string(),
            },
            SourceStrategy::Field { source_field } => {
                accessor::node_label(self.store(), ctx, source_field).await?
            }
            SourceStrategy::Capacity { capacity_ref } => {
                let id = parse_reference(capacity_ref).id;
                match ctx.label(&id) {
                    Some(label) => label.to_string(),
                    None => format!("Capability: {}", capacity_ref),
                }
            }
        })
    }
}
