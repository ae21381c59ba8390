use log::{debug, warn};
use optrace_storage::RuleStore;

use crate::context::EvalContext;
use crate::interpreter::Interpreter;
use crate::types::{CellTrace, Failure, InterpretResult, LookupMode, ResolveError, SelectorTrace};

use super::matching::{compare_cell, nearest_match, strip_copy_suffix};
use super::model::TableGrid;
use super::Lookup;

/// Where a selector sits: as a row header, as a column header, or both.
#[derive(Debug, Clone, Copy)]
struct Placement {
    in_rows: Option<usize>,
    in_cols: Option<usize>,
}

impl Placement {
    fn of(grid: &TableGrid, needle: &str) -> Self {
        Placement {
            in_rows: grid.find_row(needle),
            in_cols: grid.find_column(needle),
        }
    }

    fn is_none(&self) -> bool {
        self.in_rows.is_none() && self.in_cols.is_none()
    }
}

/// Placement of the raw selector, or of the selector without its copy
/// suffix when the raw text names no header.
fn place_selector(grid: &TableGrid, selector: &str) -> Placement {
    let placement = Placement::of(grid, selector);
    if placement.is_none() {
        if let Some(stripped) = strip_copy_suffix(selector) {
            return Placement::of(grid, stripped);
        }
    }
    placement
}

/// Cells of `row` under the given display column headers. A display header
/// naming the row-label column reads the row label.
fn row_cells(grid: &TableGrid, row: usize, display: &[String]) -> Vec<CellTrace> {
    display
        .iter()
        .filter_map(|d| {
            let column = grid.find_column(d)?;
            grid.at(row, column).map(|v| CellTrace {
                header: d.clone(),
                value: v.to_string(),
            })
        })
        .collect()
}

/// Cells of `column` under the given display row headers, skipping rows
/// outside `candidates`. A display header naming the row-label column reads
/// the column header itself.
fn column_cells(
    grid: &TableGrid,
    column: usize,
    display: &[String],
    candidates: &[usize],
) -> Vec<CellTrace> {
    display
        .iter()
        .filter_map(|d| {
            let value = match grid.find_row(d) {
                Some(row) if candidates.contains(&row) => grid.value(row, column),
                Some(_) => None,
                None if grid.find_column(d) == Some(0) => {
                    grid.columns.get(column).map(String::as_str)
                }
                None => None,
            }?;
            Some(CellTrace {
                header: d.clone(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Header matching for one fixed display header against the selector.
/// Natural orientation first, then transposed, then any partial hit.
fn match_cell(
    grid: &TableGrid,
    selector: Placement,
    fixed: Placement,
    selector_is_column: bool,
) -> Option<(usize, usize)> {
    let (row, column) = if selector_is_column {
        match (selector, fixed) {
            (Placement { in_cols: Some(c), .. }, Placement { in_rows: Some(r), .. }) => (r, c),
            (Placement { in_rows: Some(r), .. }, Placement { in_cols: Some(c), .. }) => (r, c),
            _ => (
                fixed.in_rows.or(fixed.in_cols)?,
                selector.in_cols.or(selector.in_rows)?,
            ),
        }
    } else {
        match (selector, fixed) {
            (Placement { in_rows: Some(r), .. }, Placement { in_cols: Some(c), .. }) => (r, c),
            (Placement { in_cols: Some(c), .. }, Placement { in_rows: Some(r), .. }) => (r, c),
            _ => (
                selector.in_rows.or(selector.in_cols)?,
                fixed.in_cols.or(fixed.in_rows)?,
            ),
        }
    };
    grid.value(row, column).map(|_| (row, column))
}

/// Header-matched cells for every display header, keeping only cells whose
/// row is a candidate.
fn matched_cells(
    grid: &TableGrid,
    selector: &str,
    display: &[String],
    candidates: &[usize],
    selector_is_column: bool,
) -> Vec<CellTrace> {
    let placed = place_selector(grid, selector);
    display
        .iter()
        .filter_map(|d| {
            let (row, column) =
                match_cell(grid, placed, Placement::of(grid, d), selector_is_column)?;
            if !candidates.contains(&row) {
                return None;
            }
            grid.value(row, column).map(|v| CellTrace {
                header: d.clone(),
                value: v.to_string(),
            })
        })
        .collect()
}

impl<'s, S: RuleStore + ?Sized> Interpreter<'s, S> {
    /// Rows passing every prefilter configured on either axis source.
    async fn candidate_rows(
        &self,
        lookup: &Lookup<'_>,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<Vec<usize>, Failure> {
        let grid = lookup.grid;
        let mut candidates: Vec<usize> = (0..grid.rows.len()).collect();
        let filters = [&lookup.config.row, &lookup.config.column]
            .into_iter()
            .filter_map(|axis| axis.source.as_ref()?.filter.as_ref());
        for filter in filters {
            let target = self
                .interpret(&filter.value_ref, ctx, depth + 1, None)
                .await?
                .result;
            match grid.find_column(&filter.column) {
                Some(column) => candidates.retain(|&row| {
                    compare_cell(&filter.operator, grid.at(row, column).unwrap_or(""), &target)
                }),
                None => warn!(
                    "table {}: filter column '{}' not found",
                    lookup.table.id, filter.column
                ),
            }
            debug!(
                "table {}: {} rows pass the filter on '{}'",
                lookup.table.id,
                candidates.len(),
                filter.column
            );
        }
        Ok(candidates)
    }

    pub(super) async fn column_fixed(
        &self,
        lookup: &Lookup<'_>,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        let (grid, config) = (lookup.grid, lookup.config);
        let axis = &config.column;
        let display = &axis.display;

        let selector = self
            .selector_value(axis, ctx, depth)
            .await?
            .ok_or_else(|| ResolveError::NoColumnSelection {
                table_id: lookup.table_id(),
            })?;
        let label = self.selector_label(axis, ctx).await?;
        let trace = Some(SelectorTrace {
            label: label.clone(),
            value: selector.clone(),
        });
        let bracket = format!("{}={}, {}(fixed)", label, selector, display.join("+"));
        let source = axis.source.as_ref();

        let candidates = self.candidate_rows(lookup, ctx, depth).await?;

        if let Some(extract) = &config.extract {
            let target = self
                .interpret(&extract.value_ref, ctx, depth + 1, None)
                .await?
                .result;
            let found = match grid.find_column(&selector) {
                Some(column) => candidates.iter().copied().find(|&row| {
                    compare_cell(&extract.operator, grid.at(row, column).unwrap_or(""), &target)
                }),
                None => {
                    warn!(
                        "table {}: extract column '{}' not found",
                        lookup.table.id, selector
                    );
                    None
                }
            };
            let (bracket, cells) = match found {
                Some(row) => (
                    format!(
                        "extract {} {} -> row={}",
                        extract.value_ref, extract.operator, grid.rows[row]
                    ),
                    row_cells(grid, row, display),
                ),
                None => (String::new(), Vec::new()),
            };
            return lookup.settle(
                LookupMode::ColumnFixed,
                bracket,
                None,
                trace,
                cells,
                &selector,
            );
        }

        let comparison = source
            .filter(|_| axis.is_computed())
            .and_then(|s| s.comparison.as_ref());
        if let Some(cmp) = comparison {
            match grid.find_column(&cmp.column) {
                Some(column) => {
                    let found = candidates.iter().copied().find(|&row| {
                        compare_cell(&cmp.operator, grid.at(row, column).unwrap_or(""), &selector)
                    });
                    if let Some(row) = found {
                        let cells = row_cells(grid, row, display);
                        return lookup.settle(
                            LookupMode::ColumnFixed,
                            bracket,
                            None,
                            trace,
                            cells,
                            &selector,
                        );
                    }
                }
                None => warn!(
                    "table {}: comparison column '{}' not found",
                    lookup.table.id, cmp.column
                ),
            }
        } else if axis.is_computed() {
            match nearest_match(&selector, &grid.rows, Some(&candidates)) {
                Some(row) => {
                    debug!(
                        "table {}: {} nearest to row {}",
                        lookup.table.id, selector, grid.rows[row]
                    );
                    let cells = row_cells(grid, row, display);
                    return lookup.settle(
                        LookupMode::ColumnFixed,
                        bracket,
                        None,
                        trace,
                        cells,
                        &selector,
                    );
                }
                None => warn!("table {}: no row near {}", lookup.table.id, selector),
            }
        }

        let cells = matched_cells(grid, &selector, display, &candidates, true);
        lookup.settle(
            LookupMode::ColumnFixed,
            bracket,
            None,
            trace,
            cells,
            &selector,
        )
    }

    pub(super) async fn row_fixed(
        &self,
        lookup: &Lookup<'_>,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        let (grid, config) = (lookup.grid, lookup.config);
        let axis = &config.row;
        let display = &axis.display;

        let selector = self
            .selector_value(axis, ctx, depth)
            .await?
            .ok_or_else(|| ResolveError::NoRowSelection {
                table_id: lookup.table_id(),
            })?;
        let label = self.selector_label(axis, ctx).await?;
        let trace = Some(SelectorTrace {
            label: label.clone(),
            value: selector.clone(),
        });
        let bracket = format!("{}={}, {}(fixed)", label, selector, display.join("+"));
        let data_columns: Vec<usize> = (1..grid.columns.len()).collect();
        let candidates = self.candidate_rows(lookup, ctx, depth).await?;

        if let Some(extract) = &config.extract {
            let target = self
                .interpret(&extract.value_ref, ctx, depth + 1, None)
                .await?
                .result;
            let found = match grid.find_row(&selector).filter(|row| candidates.contains(row)) {
                Some(row) => data_columns.iter().copied().find(|&column| {
                    grid.value(row, column)
                        .is_some_and(|cell| compare_cell(&extract.operator, cell, &target))
                }),
                None => {
                    warn!(
                        "table {}: extract row '{}' not found among {} candidates",
                        lookup.table.id,
                        selector,
                        candidates.len()
                    );
                    None
                }
            };
            let (bracket, cells) = match found {
                Some(column) => (
                    format!(
                        "extract {} {} -> col={}",
                        extract.value_ref, extract.operator, grid.columns[column]
                    ),
                    column_cells(grid, column, display, &candidates),
                ),
                None => (String::new(), Vec::new()),
            };
            return lookup.settle(LookupMode::RowFixed, bracket, trace, None, cells, &selector);
        }

        let source = axis.source.as_ref();
        let comparison = source
            .filter(|_| axis.is_computed())
            .and_then(|s| s.comparison.as_ref());
        if let Some(cmp) = comparison {
            match grid.find_row(&cmp.column) {
                Some(row) => {
                    let found = data_columns.iter().copied().find(|&column| {
                        grid.value(row, column)
                            .is_some_and(|cell| compare_cell(&cmp.operator, cell, &selector))
                    });
                    if let Some(column) = found {
                        let cells = column_cells(grid, column, display, &candidates);
                        return lookup.settle(
                            LookupMode::RowFixed,
                            bracket,
                            trace,
                            None,
                            cells,
                            &selector,
                        );
                    }
                }
                None => warn!(
                    "table {}: comparison row '{}' not found",
                    lookup.table.id, cmp.column
                ),
            }
        } else if axis.is_computed() {
            if let Some(row) = nearest_match(&selector, &grid.rows, Some(&candidates)) {
                let cells = row_cells(grid, row, display);
                return lookup.settle(
                    LookupMode::RowFixed,
                    bracket,
                    trace,
                    None,
                    cells,
                    &selector,
                );
            }
            warn!("table {}: no row near {}", lookup.table.id, selector);
        }

        let cells = matched_cells(grid, &selector, display, &candidates, false);
        lookup.settle(
            LookupMode::RowFixed,
            bracket,
            trace,
            None,
            cells,
            &selector,
        )
    }

    pub(super) async fn crossing(
        &self,
        lookup: &Lookup<'_>,
        ctx: &mut EvalContext,
        depth: usize,
    ) -> Result<InterpretResult, Failure> {
        let (grid, config) = (lookup.grid, lookup.config);

        let row_value = self.selector_value(&config.row, ctx, depth).await?;
        let column_value = self.selector_value(&config.column, ctx, depth).await?;
        let row_label = self.selector_label(&config.row, ctx).await?;
        let column_label = self.selector_label(&config.column, ctx).await?;

        let (mut row_sel, mut col_sel) = match (row_value, column_value) {
            (Some(r), Some(c)) => (r, c),
            (row, column) => {
                return Err(ResolveError::MissingSelection {
                    table_id: lookup.table_id(),
                    row,
                    column,
                }
                .into())
            }
        };

        let candidates = self.candidate_rows(lookup, ctx, depth).await?;
        let mut row_at = Placement::of(grid, &row_sel);
        let mut col_at = Placement::of(grid, &col_sel);
        let data_columns: Vec<usize> = (1..grid.columns.len()).collect();

        if row_at.is_none() && config.row.is_computed() {
            if let Some(r) = nearest_match(&row_sel, &grid.rows, Some(&candidates)) {
                row_at.in_rows = Some(r);
                row_sel = grid.rows[r].clone();
            } else if let Some(c) = nearest_match(&row_sel, &grid.columns, Some(&data_columns)) {
                row_at.in_cols = Some(c);
                row_sel = grid.columns[c].clone();
            }
        }
        if col_at.is_none() && config.column.is_computed() {
            if let Some(c) = nearest_match(&col_sel, &grid.columns, Some(&data_columns)) {
                col_at.in_cols = Some(c);
                col_sel = grid.columns[c].clone();
            } else if let Some(r) = nearest_match(&col_sel, &grid.rows, Some(&candidates)) {
                col_at.in_rows = Some(r);
                col_sel = grid.rows[r].clone();
            }
        }

        let (row, column, shown_row, shown_col) = match (row_at, col_at) {
            (Placement { in_rows: Some(r), .. }, Placement { in_cols: Some(c), .. }) => {
                (Some(r), Some(c), row_sel, col_sel)
            }
            (Placement { in_cols: Some(c), .. }, Placement { in_rows: Some(r), .. }) => {
                debug!("table {}: selectors transposed", lookup.table.id);
                (Some(r), Some(c), col_sel, row_sel)
            }
            _ => (
                row_at.in_rows.or(col_at.in_rows),
                row_at.in_cols.or(col_at.in_cols),
                row_sel,
                col_sel,
            ),
        };

        let row = row.filter(|r| candidates.contains(r));
        let (Some(row), Some(column)) = (row, column) else {
            return Err(ResolveError::ValueNotFound {
                table_id: lookup.table_id(),
                row: shown_row,
                column: shown_col,
            }
            .into());
        };
        let Some(value) = grid.value(row, column) else {
            return Err(ResolveError::IndexOutOfBounds {
                table_id: lookup.table_id(),
                row: shown_row,
                column: shown_col,
            }
            .into());
        };

        let cells = vec![CellTrace {
            header: shown_col.clone(),
            value: value.to_string(),
        }];
        let human = format!(
            "Table \"{}\"[{}={}, {}={}] = {}",
            lookup.table.name, row_label, shown_row, column_label, shown_col, value
        );
        let mut result = lookup.finish(
            LookupMode::Crossing,
            String::new(),
            Some(SelectorTrace {
                label: row_label,
                value: shown_row,
            }),
            Some(SelectorTrace {
                label: column_label,
                value: shown_col,
            }),
            cells,
        );
        result.human_text = human;
        Ok(result)
    }
}

impl Lookup<'_> {
    /// Finish a fixed-axis lookup; no cells at all is a not-found failure.
    pub(super) fn settle(
        &self,
        mode: LookupMode,
        bracket: String,
        row: Option<SelectorTrace>,
        column: Option<SelectorTrace>,
        cells: Vec<CellTrace>,
        selector: &str,
    ) -> Result<InterpretResult, Failure> {
        if cells.is_empty() {
            let fixed = match mode {
                LookupMode::RowFixed => &self.config.row.display,
                _ => &self.config.column.display,
            }
            .join("+");
            let (row, column) = match mode {
                LookupMode::RowFixed => (selector.to_string(), fixed),
                _ => (fixed, selector.to_string()),
            };
            warn!("table {}: no cell for [{}, {}]", self.table.id, row, column);
            return Err(ResolveError::ValueNotFound {
                table_id: self.table_id(),
                row,
                column,
            }
            .into());
        }
        Ok(self.finish(mode, bracket, row, column, cells))
    }
}
