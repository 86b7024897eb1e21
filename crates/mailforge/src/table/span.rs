//! Grouping helpers for multi-level row and column labels.
//!
//! Both are also registered as template functions in the table theme
//! environments so custom themes can merge repeated labels.

use std::collections::HashMap;
use tera::{Tera, Value};

/// Number of grid cells the label at `position` covers.
///
/// The first label of a run of equal labels covers the whole run, the
/// following ones cover nothing (0). A single label always covers 1.
/// Position 0 has no previous label. Out of range positions cover 0.
///
/// ```
/// use mailforge::table::get_span;
///
/// let labels = ["a", "a", "b"];
/// assert_eq!(get_span(&labels, 0), 2);
/// assert_eq!(get_span(&labels, 1), 0);
/// assert_eq!(get_span(&labels, 2), 1);
/// ```
#[must_use]
pub fn get_span<L: PartialEq>(labels: &[L], position: usize) -> usize {
    let Some(current) = labels.get(position) else {
        return 0;
    };
    if labels.len() == 1 {
        return 1;
    }
    if position > 0 && labels[position - 1] == *current {
        return 0;
    }
    1 + labels[position + 1..]
        .iter()
        .take_while(|next| *next == current)
        .count()
}

/// [`get_span`] over multi-level labels compared on levels `0..=width`.
///
/// `None` compares whole labels.
#[must_use]
pub fn span_at_level(labels: &[Vec<String>], position: usize, width: Option<usize>) -> usize {
    let keys: Vec<&[String]> = labels.iter().map(|label| prefix(label, width)).collect();
    get_span(&keys, position)
}

/// Whether row `n` is the last row of its top-level group.
///
/// Rows with single-level labels are never group ends. The last row always
/// is. With `level == Some(0)` every row is. With `None` only the top-level
/// labels of this and the next row are compared. Otherwise the rows sharing
/// this row's labels up to `level` are skipped and the top-level label of
/// the first row after them decides.
#[must_use]
pub fn is_last_group_row(n: usize, index: &[Vec<String>], level: Option<usize>) -> bool {
    let Some(current) = index.get(n) else {
        return false;
    };
    if current.len() < 2 {
        return false;
    }
    if n + 1 == index.len() {
        return true;
    }

    let mut next = n + 1;
    let level = match level {
        Some(0) => return true,
        None => return current.first() != index[next].first(),
        Some(level) => level,
    };

    while prefix(current, Some(level)) == prefix(&index[next], Some(level)) {
        next += 1;
        if next == index.len() {
            return true;
        }
    }
    current.first() != index[next].first()
}

fn prefix(label: &[String], width: Option<usize>) -> &[String] {
    match width {
        Some(width) => &label[..label.len().min(width.saturating_add(1))],
        None => label,
    }
}

/// Registers `get_span` and `is_last_group_row` as template functions.
pub fn register_functions(tera: &mut Tera) {
    tera.register_function("get_span", span_function);
    tera.register_function("is_last_group_row", last_group_row_function);
}

/// `get_span(labels=[...], loc=0, width=1)`
fn span_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let labels = labels_arg(args, "labels")?;
    let loc = usize_arg(args, "loc")?;
    let width = optional_usize_arg(args, "width")?;
    Ok(Value::from(span_at_level(&labels, loc, width)))
}

/// `is_last_group_row(n=0, index=[...], level=1)`
fn last_group_row_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let index = labels_arg(args, "index")?;
    let n = usize_arg(args, "n")?;
    let level = optional_usize_arg(args, "level")?;
    Ok(Value::Bool(is_last_group_row(n, &index, level)))
}

fn labels_arg(args: &HashMap<String, Value>, name: &str) -> tera::Result<Vec<Vec<String>>> {
    let values = args
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| tera::Error::msg(format!("`{name}` must be an array of labels")))?;

    Ok(values
        .iter()
        .map(|value| match value {
            Value::Array(levels) => levels.iter().map(value_to_string).collect(),
            other => vec![value_to_string(other)],
        })
        .collect())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn usize_arg(args: &HashMap<String, Value>, name: &str) -> tera::Result<usize> {
    optional_usize_arg(args, name)?
        .ok_or_else(|| tera::Error::msg(format!("`{name}` is required")))
}

fn optional_usize_arg(args: &HashMap<String, Value>, name: &str) -> tera::Result<Option<usize>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| tera::Error::msg(format!("`{name}` must be a non-negative integer"))),
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
    use proptest::prelude::*;

    fn rows(labels: &[&[&str]]) -> Vec<Vec<String>> {
        labels
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect()
    }

    #[test]
    fn test_span_runs() {
        let labels = ["a", "a", "b"];
        assert_eq!(get_span(&labels, 0), 2);
        assert_eq!(get_span(&labels, 1), 0);
        assert_eq!(get_span(&labels, 2), 1);
    }

    #[test]
    fn test_span_single_and_empty() {
        assert_eq!(get_span(&["only"], 0), 1);
        assert_eq!(get_span::<&str>(&[], 0), 0);
        assert_eq!(get_span(&["a", "b"], 5), 0);
    }

    #[test]
    fn test_span_first_position_has_no_previous() {
        // the last label must not be treated as the predecessor of the first
        let labels = ["a", "b", "a"];
        assert_eq!(get_span(&labels, 0), 1);
    }

    #[test]
    fn test_span_at_level_truncates() {
        let columns = rows(&[&["x", "1"], &["x", "2"], &["y", "1"]]);
        assert_eq!(span_at_level(&columns, 0, Some(0)), 2);
        assert_eq!(span_at_level(&columns, 1, Some(0)), 0);
        assert_eq!(span_at_level(&columns, 0, Some(1)), 1);
        assert_eq!(span_at_level(&columns, 2, None), 1);
    }

    #[test]
    fn test_widest_level_compares_whole_labels() {
        let index = rows(&[&["x", "1"], &["x", "2"], &["y", "1"]]);
        assert_eq!(span_at_level(&index, 0, Some(usize::MAX)), 1);
        assert!(!is_last_group_row(0, &index, Some(usize::MAX)));
        assert!(is_last_group_row(1, &index, Some(usize::MAX)));

        let mut tera = Tera::default();
        register_functions(&mut tera);
        let mut context = tera::Context::new();
        context.insert("index", &index);
        context.insert("level", &u64::MAX);
        let rendered = tera
            .render_str(
                "{{ get_span(labels=index, loc=0, width=level) }} {{ is_last_group_row(n=0, index=index, level=level) }}",
                &context,
            )
            .unwrap();
        assert_eq!(rendered, "1 false");
    }

    #[test]
    fn test_last_group_row_level_zero() {
        let index = rows(&[&["x", "1"], &["x", "2"], &["y", "1"]]);
        assert!(is_last_group_row(1, &index, Some(0)));
        assert!(is_last_group_row(0, &index, Some(0)));
    }

    #[test]
    fn test_last_group_row_no_level() {
        let index = rows(&[&["x", "1"], &["x", "2"], &["y", "1"]]);
        assert!(!is_last_group_row(0, &index, None));
        assert!(is_last_group_row(1, &index, None));
        assert!(is_last_group_row(2, &index, None));
    }

    #[test]
    fn test_last_group_row_deeper_level() {
        let index = rows(&[
            &["blue", "car", "a"],
            &["blue", "car", "b"],
            &["green", "car", "a"],
        ]);
        assert!(is_last_group_row(0, &index, Some(1)));
        assert!(is_last_group_row(1, &index, Some(1)));

        let index = rows(&[&["blue", "car", "a"], &["blue", "red", "a"]]);
        assert!(!is_last_group_row(0, &index, Some(1)));
    }

    #[test]
    fn test_last_group_row_runs_to_end() {
        let index = rows(&[&["x", "1"], &["x", "1"], &["x", "1"]]);
        assert!(is_last_group_row(0, &index, Some(1)));
    }

    #[test]
    fn test_last_group_row_single_level() {
        let index = rows(&[&["a"], &["b"]]);
        assert!(!is_last_group_row(0, &index, None));
        assert!(!is_last_group_row(1, &index, None));
        assert!(!is_last_group_row(9, &index, None));
    }

    #[test]
    fn test_template_functions() {
        let mut tera = Tera::default();
        register_functions(&mut tera);
        let mut context = tera::Context::new();
        context.insert("labels", &vec!["a", "a", "b"]);
        context.insert("index", &rows(&[&["x", "1"], &["x", "2"], &["y", "1"]]));

        let rendered = tera
            .render_str(
                "{{ get_span(labels=labels, loc=0) }} {{ is_last_group_row(n=1, index=index) }}",
                &context,
            )
            .unwrap();
        assert_eq!(rendered, "2 true");
    }

    proptest! {
        #[test]
        fn prop_spans_cover_every_label(labels in proptest::collection::vec("[ab]", 1..20)) {
            let total: usize = (0..labels.len()).map(|pos| get_span(&labels, pos)).sum();
            prop_assert_eq!(total, labels.len());
            for pos in 1..labels.len() {
                prop_assert_eq!(get_span(&labels, pos) == 0, labels[pos - 1] == labels[pos]);
            }
        }
    }
}
