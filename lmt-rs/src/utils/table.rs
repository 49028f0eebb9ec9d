//! Table formatting utilities

use prettytable::{Cell, Row, Table};

/// Create a table with bold headers
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).style_spec("b"))
        .collect();
    table.set_titles(Row::new(header_cells));

    table
}

/// Add a row to a table; numeric cells are right-aligned
pub fn add_table_row(table: &mut Table, cells: Vec<String>) {
    let row_cells: Vec<Cell> = cells
        .into_iter()
        .map(|s| {
            let cell = Cell::new(&s);
            if is_numeric(&s) {
                cell.style_spec("r")
            } else {
                cell
            }
        })
        .collect();
    table.add_row(Row::new(row_cells));
}

fn is_numeric(text: &str) -> bool {
    text.parse::<f64>().is_ok()
        || text
            .strip_prefix("0x")
            .is_some_and(|hex| u64::from_str_radix(hex, 16).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows() {
        let mut table = create_table(&["Slot", "Offset", "Name"]);
        add_table_row(&mut table, vec!["1".into(), "0x40".into(), "walk".into()]);
        assert_eq!(table.len(), 1);
        assert!(is_numeric("-0.5000"));
        assert!(is_numeric("0x40"));
        assert!(!is_numeric("walk"));
    }
}
