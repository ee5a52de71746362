use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single spreadsheet cell as delivered by the grid reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    /// Numeric content, if the cell holds a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from(value.as_str())
    }
}

/// Read-only access to a spreadsheet-shaped grid.
///
/// Rows are 1-based (as in the sheet), columns are zero-based (`A` is 0).
/// Cells outside the populated area read as [`CellValue::Empty`].
pub trait GridAccessor {
    fn cell_value(&self, row: u32, column: u32) -> CellValue;
}

impl<T: GridAccessor + ?Sized> GridAccessor for &T {
    fn cell_value(&self, row: u32, column: u32) -> CellValue {
        (**self).cell_value(row, column)
    }
}

/// In-memory grid, stored row-major starting at sheet row 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Builds a grid from raw text records, turning numeric-looking text into numbers.
    pub fn from_text_rows<R, S>(records: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|field| {
                        let field = field.as_ref();
                        match crate::utils::parse_numeric_text(field) {
                            Some(v) => CellValue::Number(v),
                            None => CellValue::from(field),
                        }
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn set(&mut self, row: u32, column: u32, value: impl Into<CellValue>) {
        if row == 0 {
            return;
        }
        let r = (row - 1) as usize;
        let c = column as usize;
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize_with(c + 1, CellValue::default);
        }
        cells[c] = value.into();
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl GridAccessor for Grid {
    fn cell_value(&self, row: u32, column: u32) -> CellValue {
        if row == 0 {
            return CellValue::Empty;
        }
        self.rows
            .get((row - 1) as usize)
            .and_then(|cells| cells.get(column as usize))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_addressing() {
        let grid = Grid::from_text_rows(vec![vec!["Concept", "Jan", "Feb"], vec!["Sales", "100", "x"]]);

        assert_eq!(grid.cell_value(1, 1), CellValue::Text("Jan".to_string()));
        assert_eq!(grid.cell_value(2, 1), CellValue::Number(100.0));
        assert_eq!(grid.cell_value(2, 2), CellValue::Text("x".to_string()));
        assert_eq!(grid.cell_value(0, 0), CellValue::Empty);
        assert_eq!(grid.cell_value(9, 9), CellValue::Empty);
    }

    #[test]
    fn test_grid_set_grows() {
        let mut grid = Grid::default();
        grid.set(3, 2, 42.0);
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.cell_value(3, 2).as_number(), Some(42.0));
        assert!(grid.cell_value(3, 0).is_blank());
    }

    #[test]
    fn test_cell_value_json() {
        let cells: Vec<CellValue> = serde_json::from_str(r#"[1.5, "Q1", null]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                CellValue::Number(1.5),
                CellValue::Text("Q1".to_string()),
                CellValue::Empty
            ]
        );
        assert!(CellValue::Text("  ".to_string()).is_blank());
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
    }
}
