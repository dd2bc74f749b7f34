use std::fmt::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Align {
    #[default]
    Left,
    Right,
}

pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    fn is_awk_safe(&self) -> bool {
        !self
            .cells
            .iter()
            .any(|cell| cell.is_empty() || cell.contains(char::is_whitespace))
    }

    fn columns(&self) -> usize {
        self.cells.len()
    }
}

impl From<Vec<String>> for Row {
    fn from(value: Vec<String>) -> Self {
        Row { cells: value }
    }
}

impl From<Vec<&str>> for Row {
    fn from(value: Vec<&str>) -> Self {
        Row {
            cells: value.into_iter().map(str::to_owned).collect(),
        }
    }
}

/// A whitespace-aligned table which `awk` and `cut` can pick apart. The
/// column count is fixed by the header; rows with a different width are
/// padded or truncated.
pub(crate) struct Table {
    header: Row,
    align: Vec<Align>,
    body: Vec<Row>,
    print_header: bool,
}

impl Table {
    /// Header cells must be non-empty and free of whitespace.
    pub(crate) fn new<R: Into<Row>>(header: R) -> Table {
        let header = header.into();

        debug_assert!(header.is_awk_safe(), "table header contains whitespace");

        Table {
            align: vec![Align::Left; header.columns()],
            header,
            body: Vec::new(),
            print_header: true,
        }
    }

    pub(crate) fn align(mut self, column: usize, align: Align) -> Table {
        if let Some(slot) = self.align.get_mut(column) {
            *slot = align;
        }

        self
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    pub(crate) fn add_row<R: Into<Row>>(&mut self, row: R) {
        let mut row = row.into();

        row.cells.resize(self.header.columns(), String::new());

        self.body.push(row);
    }

    fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        let header = self.print_header.then_some(&self.header);

        header.into_iter().chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.header.columns()];

        for row in self.iter_rows() {
            for (width, cell) in widths.iter_mut().zip(&row.cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();
        let last = widths.len().saturating_sub(1);

        for row in self.iter_rows() {
            for (i, cell) in row.cells.iter().enumerate() {
                let width = widths[i];

                match self.align[i] {
                    Align::Right => write!(f, "{:>width$}", cell, width = width)?,
                    // No trailing padding on the last column
                    Align::Left if i == last => f.write_str(cell)?,
                    Align::Left => write!(f, "{:<width$}", cell, width = width)?,
                }

                if i != last {
                    f.write_str("  ")?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut tab = Table::new(vec!["PROVIDER", "MODELS"]).align(1, Align::Right);

        tab.add_row(vec!["openai".to_string(), "12".to_string()]);
        tab.add_row(vec!["router".to_string(), "3".to_string()]);

        tab
    }

    #[test]
    fn test_display() {
        assert_eq!(
            sample().to_string(),
            "PROVIDER  MODELS\nopenai        12\nrouter         3\n"
        );
    }

    #[test]
    fn test_headerless() {
        let mut tab = sample();
        tab.print_header(false);

        assert_eq!(tab.to_string(), "openai  12\nrouter   3\n");
    }

    #[test]
    fn test_left_aligned_last_column_is_not_padded() {
        let mut tab = Table::new(vec!["MODEL", "PROVIDER"]);

        tab.add_row(vec!["openai/gpt-4o", "openai"]);
        tab.add_row(vec!["x", "anthropic"]);

        assert_eq!(
            tab.to_string(),
            "MODEL          PROVIDER\nopenai/gpt-4o  openai\nx              anthropic\n"
        );
    }

    #[test]
    fn test_ragged_rows() {
        let mut tab = Table::new(vec!["A", "B"]);

        tab.add_row(vec!["1"]);
        tab.add_row(vec!["1", "2", "3"]);

        assert_eq!(tab.to_string(), "A  B\n1  \n1  2\n");
    }
}
