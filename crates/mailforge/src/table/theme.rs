//! Theme-driven table rendering for email bodies.

use super::{BodyTable, Table, is_last_group_row, span_at_level};
use crate::body::Channel;
use crate::capability::Capabilities;
use crate::error::{Error, Result};
use crate::templates::{TemplateKind, Templates};
use serde::Serialize;
use tera::Context;

/// Header cell covering `span` columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCell {
    /// Label text.
    pub value: String,
    /// Number of columns covered.
    pub span: usize,
}

/// Row label cell covering `span` rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexCell {
    /// Label text.
    pub value: String,
    /// Number of rows covered.
    pub span: usize,
    /// Label level, outermost 0.
    pub level: usize,
}

/// One body row as seen by a theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    /// Visible row label cells (merged ones omitted).
    pub index: Vec<IndexCell>,
    /// Cell values.
    pub values: Vec<String>,
    /// Whether a group separator follows this row.
    pub group_end: bool,
}

/// Template context for table themes, exposed as `table`.
///
/// Merged labels are precomputed into `header` and `rows`; the raw labels
/// are there too for themes that call `get_span` themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    /// Depth of the column labels.
    pub column_levels: usize,
    /// Depth of the row labels.
    pub index_levels: usize,
    /// Whether rows carry explicit labels.
    pub has_index: bool,
    /// Visible header cells per level.
    pub header: Vec<Vec<HeaderCell>>,
    /// Body rows.
    pub rows: Vec<RowView>,
    /// Raw column labels.
    pub columns: Vec<Vec<String>>,
    /// Raw row labels.
    pub index: Vec<Vec<String>>,
    /// Native aligned text rendering.
    pub text: String,
}

impl TableView {
    /// Builds the view of a table.
    #[must_use]
    pub fn new(table: &Table) -> Self {
        let columns = table.columns().to_vec();
        let index = table.index();
        let index_levels = table.index_levels();

        let header = (0..table.column_levels())
            .map(|level| {
                (0..columns.len())
                    .filter_map(|col| {
                        let span = span_at_level(&columns, col, Some(level));
                        (span > 0).then(|| HeaderCell {
                            value: columns[col].get(level).cloned().unwrap_or_default(),
                            span,
                        })
                    })
                    .collect()
            })
            .collect();

        let rows = table
            .rows()
            .iter()
            .enumerate()
            .map(|(row, values)| RowView {
                index: (0..index_levels)
                    .filter_map(|level| {
                        let span = span_at_level(&index, row, Some(level));
                        (span > 0).then(|| IndexCell {
                            value: index[row].get(level).cloned().unwrap_or_default(),
                            span,
                            level,
                        })
                    })
                    .collect(),
                values: values.clone(),
                group_end: is_last_group_row(row, &index, None),
            })
            .collect();

        Self {
            column_levels: table.column_levels(),
            index_levels,
            has_index: table.has_index(),
            header,
            rows,
            columns,
            index,
            text: table.to_text(),
        }
    }
}

/// Renders a body table for a channel.
///
/// Plain tables use the theme when one is given, else their native
/// rendering. Styled tables are CSS-inlined in HTML and rendered as their
/// underlying table in text.
///
/// # Errors
///
/// Returns `MissingCapability` for a styled HTML table without a CSS
/// inliner, or the theme's template error.
pub fn render_table(
    table: &BodyTable,
    channel: Channel,
    theme: Option<&str>,
    templates: &Templates,
    capabilities: &Capabilities,
) -> Result<String> {
    match (table, channel) {
        (BodyTable::Styled(styled), Channel::Html) => {
            let inliner = capabilities.css_inliner.as_ref().ok_or_else(|| {
                Error::MissingCapability("styled tables require a CSS inliner".to_string())
            })?;
            Ok(inliner.inline(&styled.to_html())?)
        }
        (BodyTable::Styled(styled), Channel::Text) => {
            render_plain(styled.table(), channel, theme, templates)
        }
        (BodyTable::Plain(table), _) => render_plain(table, channel, theme, templates),
    }
}

fn render_plain(
    table: &Table,
    channel: Channel,
    theme: Option<&str>,
    templates: &Templates,
) -> Result<String> {
    let Some(theme) = theme else {
        return Ok(match channel {
            Channel::Html => table.to_html(),
            Channel::Text => table.to_text(),
        });
    };

    let kind = match channel {
        Channel::Html => TemplateKind::HtmlTable,
        Channel::Text => TemplateKind::TextTable,
    };
    let mut context = Context::new();
    context.insert("table", &TableView::new(table));
    templates.render(kind, theme, &context)
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
    use crate::capability::CssInliner;
    use crate::table::StyledTable;
    use std::io;

    #[derive(Debug)]
    struct StripStyle;

    impl CssInliner for StripStyle {
        fn inline(&self, html: &str) -> io::Result<String> {
            let start = html.find("<table").unwrap_or(0);
            Ok(html[start..].replace("<td>", "<td style=\"color: red\">"))
        }
    }

    fn grouped() -> Table {
        let mut table = Table::new(["value"]);
        table.push_labeled_row(["x", "1"], ["<10>"]).unwrap();
        table.push_labeled_row(["x", "2"], ["20"]).unwrap();
        table.push_labeled_row(["y", "1"], ["30"]).unwrap();
        table
    }

    #[test]
    fn test_view_merges_labels() {
        let view = TableView::new(&grouped());
        assert_eq!(view.index_levels, 2);
        assert_eq!(view.rows[0].index.len(), 2);
        assert_eq!(view.rows[0].index[0].span, 2);
        assert_eq!(view.rows[1].index.len(), 1);
        assert_eq!(view.rows[1].index[0].level, 1);
        assert!(!view.rows[0].group_end);
        assert!(view.rows[1].group_end);
        assert!(view.rows[2].group_end);
    }

    #[test]
    fn test_modest_theme() {
        let templates = Templates::new().unwrap();
        let html = render_table(
            &grouped().into(),
            Channel::Html,
            Some("modest"),
            &templates,
            &Capabilities::none(),
        )
        .unwrap();
        assert!(html.starts_with("<table"));
        assert!(html.contains("rowspan=\"2\""));
        assert!(html.contains("&lt;10&gt;"));
        assert!(html.contains("2px solid"));
    }

    #[test]
    fn test_pandas_theme_matches_native_text() {
        let templates = Templates::new().unwrap();
        let table = grouped();
        let text = render_table(
            &table.clone().into(),
            Channel::Text,
            Some("pandas"),
            &templates,
            &Capabilities::none(),
        )
        .unwrap();
        assert_eq!(text.trim_end(), table.to_text());
    }

    #[test]
    fn test_no_theme_uses_native() {
        let templates = Templates::new().unwrap();
        let table = grouped();
        let html = render_table(
            &table.clone().into(),
            Channel::Html,
            None,
            &templates,
            &Capabilities::none(),
        )
        .unwrap();
        assert_eq!(html, table.to_html());
    }

    #[test]
    fn test_styled_table_needs_inliner() {
        let templates = Templates::new().unwrap();
        let styled: BodyTable = StyledTable::new(grouped()).with_rule("td", "color: red").into();

        let err = render_table(&styled, Channel::Html, Some("modest"), &templates, &Capabilities::none())
            .unwrap_err();
        assert!(matches!(err, Error::MissingCapability(_)));

        let caps = Capabilities::none().with_css_inliner(StripStyle);
        let html = render_table(&styled, Channel::Html, Some("modest"), &templates, &caps).unwrap();
        assert!(html.starts_with("<table"));
        assert!(html.contains("<td style=\"color: red\">"));

        let text = render_table(&styled, Channel::Text, None, &templates, &Capabilities::none()).unwrap();
        assert_eq!(text, grouped().to_text());
    }
}
