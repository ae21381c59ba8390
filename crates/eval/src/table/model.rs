use optrace_storage::TableRecord;
use serde_json::Value;

use crate::accessor::render_json;

use super::matching::find_header;

/// Headers and cell matrix of a table.
///
/// `data[r][c - 1]` is the cell at row header `rows[r]` and column header
/// `columns[c]`; column 0 is the row-label column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableGrid {
    pub columns: Vec<String>,
    pub rows: Vec<String>,
    pub data: Vec<Vec<String>>,
}

fn cell_text(value: &Value) -> String {
    render_json(value)
}

/// Cells of a stored row: a JSON array, a string holding one, or a plain
/// string standing for a single cell.
fn decode_cells(cells: &Value) -> Vec<String> {
    match cells {
        Value::Array(items) => items.iter().map(cell_text).collect(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items.iter().map(cell_text).collect(),
            _ => vec![text.clone()],
        },
        _ => Vec::new(),
    }
}

impl TableGrid {
    /// Rebuild the grid from stored columns and rows. Row 0 is the header
    /// row and only seeds the column headers when no columns are defined.
    pub fn from_record(record: &TableRecord) -> Self {
        let mut columns: Vec<String> = record.columns.iter().map(|c| c.name.clone()).collect();
        let mut rows = Vec::new();
        let mut data = Vec::new();

        for row in &record.rows {
            let cells = decode_cells(&row.cells);
            if row.row_index == 0 {
                if columns.is_empty() {
                    columns = cells;
                }
                continue;
            }
            match cells.split_first() {
                Some((label, rest)) => {
                    rows.push(label.clone());
                    data.push(rest.to_vec());
                }
                None => {
                    rows.push(format!("Row {}", row.row_index));
                    data.push(Vec::new());
                }
            }
        }

        TableGrid {
            columns,
            rows,
            data,
        }
    }

    pub fn find_column(&self, needle: &str) -> Option<usize> {
        find_header(&self.columns, needle)
    }

    pub fn find_row(&self, needle: &str) -> Option<usize> {
        find_header(&self.rows, needle)
    }

    /// Data cell at row `row`, column header `column` (1-based in data).
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        let c = column.checked_sub(1)?;
        self.data.get(row)?.get(c).map(String::as_str)
    }

    /// Like [`TableGrid::value`], but column 0 reads the row label.
    pub fn at(&self, row: usize, column: usize) -> Option<&str> {
        if column == 0 {
            self.rows.get(row).map(String::as_str)
        } else {
            self.value(row, column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optrace_storage::{TableColumnRecord, TableRowRecord};

    fn record(columns: &[&str], rows: Vec<Value>) -> TableRecord {
        TableRecord {
            id: "t".into(),
            node_id: "n".into(),
            name: "T".into(),
            is_default: false,
            updated_at: None,
            columns: columns
                .iter()
                .enumerate()
                .map(|(i, name)| TableColumnRecord {
                    column_index: i as u32,
                    name: name.to_string(),
                })
                .collect(),
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(i, cells)| TableRowRecord {
                    row_index: i as u32,
                    cells,
                })
                .collect(),
            meta: Value::Null,
        }
    }

    #[test]
    fn header_row_is_skipped() {
        let grid = TableGrid::from_record(&record(
            &["Revenu", "Coefficient"],
            vec![
                serde_json::json!(["Revenu", "Coefficient"]),
                serde_json::json!(["1-26900", "R1-X6"]),
                serde_json::json!("[\"26901-38300\", \"R2-X4\"]"),
            ],
        ));
        assert_eq!(grid.rows, vec!["1-26900", "26901-38300"]);
        assert_eq!(grid.value(1, 1), Some("R2-X4"));
        assert_eq!(grid.at(1, 0), Some("26901-38300"));
        assert_eq!(grid.value(1, 0), None);
        assert_eq!(grid.value(5, 1), None);
    }

    #[test]
    fn header_row_seeds_columns_when_undefined() {
        let grid = TableGrid::from_record(&record(
            &[],
            vec![
                serde_json::json!(["Orientation", "0°", "5°"]),
                serde_json::json!(["Nord", 86, 82]),
            ],
        ));
        assert_eq!(grid.columns, vec!["Orientation", "0°", "5°"]);
        assert_eq!(grid.value(0, 2), Some("82"));
    }

    #[test]
    fn plain_and_empty_rows() {
        let grid = TableGrid::from_record(&record(
            &["A"],
            vec![
                serde_json::json!(["A"]),
                serde_json::json!("Orientation"),
                serde_json::json!([]),
            ],
        ));
        assert_eq!(grid.rows, vec!["Orientation", "Row 2"]);
        assert!(grid.data[0].is_empty());
    }
}
