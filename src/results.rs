//! Query result types.
//!
//! Rows arrive from the data gateway as JSON objects. Column headers are
//! derived from the key order of the first row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single scalar value (query parameter or cell).
pub type Scalar = Value;

/// One result row: column name to scalar, in the order the backend sent.
pub type Row = Map<String, Value>;

/// Rows returned by one executed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    rows: Vec<Row>,
    columns: Vec<String>,
}

impl ResultSet {
    /// Builds a result set, taking column headers from the first row.
    pub fn new(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { rows, columns }
    }

    /// Returns the rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the column headers (empty when there are no rows).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serializes the rows as a JSON array for embedding in a prompt.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.rows).unwrap_or_else(|_| "[]".to_string())
    }

    /// Renders the result set as a plain-text table.
    ///
    /// Cells missing from a row render as empty; nulls render as `NULL`.
    pub fn render_table(&self) -> String {
        if self.columns.is_empty() {
            return "(0 rows)".to_string();
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|col| row.get(col).map(display_scalar).unwrap_or_default())
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(col.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let format_line = |values: &[String]| -> String {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{v:<w$}"))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&format_line(&self.columns));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &cells {
            out.push('\n');
            out.push_str(&format_line(row));
        }

        let noun = if self.rows.len() == 1 { "row" } else { "rows" };
        out.push_str(&format!("\n({} {})", self.rows.len(), noun));
        out
    }
}

/// Formats a scalar for display in a table cell.
pub fn display_scalar(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
