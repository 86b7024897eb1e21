//! Labeled two-dimensional tables and their renderings.
//!
//! A [`Table`] has named columns (one or more label levels), an optional
//! row index (one or more label levels, positional when absent) and string
//! cells. It renders natively to CSV, HTML and aligned text, and through a
//! theme template (see [`theme`]) for email bodies.

mod span;
pub mod theme;

pub use span::{get_span, is_last_group_row, register_functions, span_at_level};

use crate::error::{Error, Result};
use html_escape::encode_text;
use std::fmt::Write as _;

/// A labeled table of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<Vec<String>>,
    index: Option<Vec<Vec<String>>>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates an empty table with single-level column names.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_column_levels(columns.into_iter().map(|name| vec![name.into()]).collect())
    }

    /// Creates an empty table whose columns carry multi-level labels
    /// (outermost level first).
    #[must_use]
    pub fn with_column_levels(columns: Vec<Vec<String>>) -> Self {
        Self {
            columns,
            index: None,
            rows: Vec::new(),
        }
    }

    /// Appends a row labeled by its position.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the row width does not match the columns
    /// or the table already has labeled rows.
    pub fn push_row<I, S>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.index.is_some() {
            return Err(Error::InvalidArgument(
                "cannot mix positional and labeled rows".to_string(),
            ));
        }
        let values = self.checked_values(values)?;
        self.rows.push(values);
        Ok(())
    }

    /// Appends a row with index labels (outermost level first).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the row width or label depth does not
    /// match, or the table already has positional rows.
    pub fn push_labeled_row<L, I, S>(&mut self, labels: L, values: I) -> Result<()>
    where
        L: IntoIterator<Item = S>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(Error::InvalidArgument("row label cannot be empty".to_string()));
        }
        if self.index.is_none() && !self.rows.is_empty() {
            return Err(Error::InvalidArgument(
                "cannot mix positional and labeled rows".to_string(),
            ));
        }
        if let Some(depth) = self.index.as_ref().and_then(|index| index.first()).map(Vec::len)
            && depth != labels.len()
        {
            return Err(Error::InvalidArgument(format!(
                "row label has {} levels, expected {depth}",
                labels.len()
            )));
        }

        let values = self.checked_values(values)?;
        self.index.get_or_insert_with(Vec::new).push(labels);
        self.rows.push(values);
        Ok(())
    }

    fn checked_values<I, S>(&self, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.len() != self.columns.len() {
            return Err(Error::InvalidArgument(format!(
                "row has {} values, table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        Ok(values)
    }

    /// Column labels, outermost level first.
    #[must_use]
    pub fn columns(&self) -> &[Vec<String>] {
        &self.columns
    }

    /// Row labels; positional numbers when no index was given.
    #[must_use]
    pub fn index(&self) -> Vec<Vec<String>> {
        self.index.clone().unwrap_or_else(|| {
            (0..self.rows.len())
                .map(|position| vec![position.to_string()])
                .collect()
        })
    }

    /// Whether rows carry explicit labels.
    #[must_use]
    pub const fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Cell values, row by row.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Depth of the column labels.
    #[must_use]
    pub fn column_levels(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(1)
    }

    /// Depth of the row labels.
    #[must_use]
    pub fn index_levels(&self) -> usize {
        self.index
            .as_ref()
            .and_then(|index| index.first())
            .map_or(1, Vec::len)
    }

    fn column_label(&self, column: usize, level: usize) -> &str {
        self.columns[column].get(level).map_or("", String::as_str)
    }

    /// CSV with one header line per column level and the index in front.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV writer fails.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let index_levels = self.index_levels();

        for level in 0..self.column_levels() {
            let mut record = vec![String::new(); index_levels];
            record.extend((0..self.columns.len()).map(|col| self.column_label(col, level).to_string()));
            writer.write_record(&record)?;
        }

        for (labels, values) in self.index().iter().zip(&self.rows) {
            writer.write_record(labels.iter().chain(values))?;
        }

        writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }

    /// Plain HTML table; repeated labels are merged with `colspan`/`rowspan`.
    #[must_use]
    pub fn to_html(&self) -> String {
        let index = self.index();
        let index_levels = self.index_levels();
        let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n");

        for level in 0..self.column_levels() {
            html.push_str("    <tr style=\"text-align: right;\">\n");
            for _ in 0..index_levels {
                html.push_str("      <th></th>\n");
            }
            for col in 0..self.columns.len() {
                let span = span_at_level(&self.columns, col, Some(level));
                if span == 0 {
                    continue;
                }
                let label = encode_text(self.column_label(col, level));
                if span > 1 {
                    let _ = writeln!(html, "      <th colspan=\"{span}\" halign=\"left\">{label}</th>");
                } else {
                    let _ = writeln!(html, "      <th>{label}</th>");
                }
            }
            html.push_str("    </tr>\n");
        }
        html.push_str("  </thead>\n  <tbody>\n");

        for (row, values) in self.rows.iter().enumerate() {
            html.push_str("    <tr>\n");
            for level in 0..index_levels {
                let span = span_at_level(&index, row, Some(level));
                if span == 0 {
                    continue;
                }
                let label = encode_text(index[row].get(level).map_or("", String::as_str));
                if span > 1 {
                    let _ = writeln!(html, "      <th rowspan=\"{span}\" valign=\"top\">{label}</th>");
                } else {
                    let _ = writeln!(html, "      <th>{label}</th>");
                }
            }
            for value in values {
                let _ = writeln!(html, "      <td>{}</td>", encode_text(value));
            }
            html.push_str("    </tr>\n");
        }
        html.push_str("  </tbody>\n</table>");
        html
    }

    /// Aligned text: values right-aligned, repeated labels shown once.
    #[must_use]
    pub fn to_text(&self) -> String {
        let index = self.index();
        let index_levels = self.index_levels();
        let column_levels = self.column_levels();

        let mut grid: Vec<Vec<String>> = Vec::new();
        for level in 0..column_levels {
            let mut line = vec![String::new(); index_levels];
            line.extend((0..self.columns.len()).map(|col| {
                if span_at_level(&self.columns, col, Some(level)) == 0 {
                    String::new()
                } else {
                    self.column_label(col, level).to_string()
                }
            }));
            grid.push(line);
        }
        for (row, values) in self.rows.iter().enumerate() {
            let mut line: Vec<String> = (0..index_levels)
                .map(|level| {
                    if span_at_level(&index, row, Some(level)) == 0 {
                        String::new()
                    } else {
                        index[row].get(level).cloned().unwrap_or_default()
                    }
                })
                .collect();
            line.extend(values.iter().cloned());
            grid.push(line);
        }

        let width_count = index_levels + self.columns.len();
        let widths: Vec<usize> = (0..width_count)
            .map(|col| {
                grid.iter()
                    .map(|line| line[col].chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        grid.iter()
            .map(|line| {
                let cells: Vec<String> = line
                    .iter()
                    .zip(&widths)
                    .enumerate()
                    .map(|(col, (cell, width))| {
                        if col < index_levels {
                            format!("{cell:<width$}")
                        } else {
                            format!("{cell:>width$}")
                        }
                    })
                    .collect();
                cells.join("  ").trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A table carrying its own CSS rules.
///
/// In HTML bodies it bypasses the theme and goes through the CSS inliner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledTable {
    table: Table,
    rules: Vec<(String, String)>,
}

impl StyledTable {
    /// Wraps a table without rules.
    #[must_use]
    pub const fn new(table: Table) -> Self {
        Self {
            table,
            rules: Vec::new(),
        }
    }

    /// Adds a CSS rule, e.g. `("td", "color: red")`.
    #[must_use]
    pub fn with_rule(mut self, selector: impl Into<String>, declarations: impl Into<String>) -> Self {
        self.rules.push((selector.into(), declarations.into()));
        self
    }

    /// The underlying table.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// HTML with a `<style>` block in front of the table.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = String::from("<style type=\"text/css\">\n");
        for (selector, declarations) in &self.rules {
            let _ = writeln!(html, "{selector} {{ {declarations} }}");
        }
        html.push_str("</style>\n");
        html.push_str(&self.table.to_html());
        html
    }
}

/// A table embedded in a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyTable {
    /// Rendered through the channel's theme.
    Plain(Table),
    /// Rendered with its own styles (HTML) or as plain table (text).
    Styled(StyledTable),
}

impl From<Table> for BodyTable {
    fn from(table: Table) -> Self {
        Self::Plain(table)
    }
}

impl From<StyledTable> for BodyTable {
    fn from(table: StyledTable) -> Self {
        Self::Styled(table)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn simple() -> Table {
        let mut table = Table::new(["name", "qty"]);
        table.push_row(["apple", "3"]).unwrap();
        table.push_row(["kiwi", "12"]).unwrap();
        table
    }

    fn grouped() -> Table {
        let mut table = Table::with_column_levels(vec![
            vec!["fruit".to_string(), "name".to_string()],
            vec!["fruit".to_string(), "qty".to_string()],
        ]);
        table.push_labeled_row(["x", "1"], ["apple", "3"]).unwrap();
        table.push_labeled_row(["x", "2"], ["pear", "4"]).unwrap();
        table.push_labeled_row(["y", "1"], ["kiwi", "12"]).unwrap();
        table
    }

    #[test]
    fn test_row_width_is_checked() {
        let mut table = Table::new(["a", "b"]);
        assert!(matches!(table.push_row(["1"]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_rows_cannot_mix() {
        let mut table = simple();
        assert!(table.push_labeled_row(["x"], ["a", "b"]).is_err());

        let mut table = grouped();
        assert!(table.push_row(["a", "b"]).is_err());
        assert!(table.push_labeled_row(["z"], ["a", "b"]).is_err());
    }

    #[test]
    fn test_positional_index() {
        let table = simple();
        assert!(!table.has_index());
        assert_eq!(table.index(), vec![vec!["0".to_string()], vec!["1".to_string()]]);
        assert_eq!(table.index_levels(), 1);
        assert_eq!(table.column_levels(), 1);
    }

    #[test]
    fn test_csv() {
        let csv = String::from_utf8(simple().to_csv().unwrap()).unwrap();
        assert_eq!(csv, ",name,qty\n0,apple,3\n1,kiwi,12\n");
    }

    #[test]
    fn test_csv_multi_level() {
        let csv = String::from_utf8(grouped().to_csv().unwrap()).unwrap();
        assert_eq!(
            csv,
            ",,fruit,fruit\n,,name,qty\nx,1,apple,3\nx,2,pear,4\ny,1,kiwi,12\n"
        );
    }

    #[test]
    fn test_text() {
        assert_eq!(
            simple().to_text(),
            "    name  qty\n0  apple    3\n1   kiwi   12"
        );
    }

    #[test]
    fn test_text_sparsifies_labels() {
        let text = grouped().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "      fruit");
        assert!(lines[3].starts_with("   2"));
        assert!(lines[4].starts_with("y  1"));
    }

    #[test]
    fn test_html_merges_labels() {
        let html = grouped().to_html();
        assert!(html.contains("<th colspan=\"2\" halign=\"left\">fruit</th>"));
        assert!(html.contains("<th rowspan=\"2\" valign=\"top\">x</th>"));
        assert_eq!(html.matches("<td>").count(), 6);
    }

    #[test]
    fn test_html_escapes_values() {
        let mut table = Table::new(["a"]);
        table.push_row(["<b>"]).unwrap();
        assert!(table.to_html().contains("<td>&lt;b&gt;</td>"));
    }

    #[test]
    fn test_styled_table_html() {
        let styled = StyledTable::new(simple()).with_rule("td", "color: red");
        let html = styled.to_html();
        assert!(html.starts_with("<style type=\"text/css\">\ntd { color: red }\n</style>\n<table"));
    }
}
