use crate::filter::{Filter, FilterParseError};
use crate::store::{ColumnValue, LogLevel, ParametricString};
use crate::view::{LogDocument, ViewError, ViewId};
use colored::{ColoredString, Colorize};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value, json};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error(transparent)]
    View(#[from] ViewError),

    #[error("Failed to serialize rows: {0}")]
    Json(#[from] serde_json::Error),
}

/// Create a table with the shared look and a bold header row
pub fn create_styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

fn level_style(level: LogLevel, text: &str) -> ColoredString {
    match level {
        LogLevel::Critical => text.red().bold().reversed(),
        LogLevel::Error => text.red().bold(),
        LogLevel::Warning => text.yellow().bold(),
        LogLevel::Info => text.normal(),
        LogLevel::Verbose => text.dimmed(),
    }
}

/// Record text with substituted parameters in bold
pub fn styled_text(text: &ParametricString) -> String {
    text.spans()
        .iter()
        .map(|span| {
            if span.substituted {
                span.text.bold().to_string()
            } else {
                span.text.clone()
            }
        })
        .collect()
}

fn styled_value(value: &ColumnValue, styled: bool) -> String {
    match value {
        ColumnValue::Text(text) if styled => styled_text(text),
        ColumnValue::Level(level) if styled => level_style(*level, level.as_str()).to_string(),
        ColumnValue::Tags(slots) if styled && !slots.is_empty() => value.to_string().cyan().to_string(),
        other => other.to_string(),
    }
}

/// Column indices to print, resolved from configured names; every column
/// when `names` is empty. Unknown names are skipped.
pub fn resolve_columns(doc: &LogDocument, names: &[String]) -> Vec<usize> {
    if names.is_empty() {
        return (0..doc.store().columns().len()).collect();
    }
    names
        .iter()
        .filter_map(|name| doc.store().column_index(name))
        .collect()
}

/// Render `rows` of a view as a table; `styled` adds terminal colours
pub fn format_rows_text(
    doc: &LogDocument,
    view: ViewId,
    columns: &[usize],
    rows: Range<usize>,
    styled: bool,
) -> Result<String, DisplayError> {
    let schema = doc.store().columns();
    let headers: Vec<&str> = columns.iter().map(|c| schema[*c].name).collect();
    let mut table = create_styled_table(&headers);
    if !styled {
        table.force_no_tty();
    }

    for row in rows {
        let mut cells = Vec::with_capacity(columns.len());
        for &column in columns {
            let value = doc.column_value(view, row, column)?;
            cells.push(Cell::new(styled_value(&value, styled)));
        }
        table.add_row(cells);
    }

    Ok(format!("{table}\n"))
}

/// Render `rows` of a view as a JSON array of objects keyed by column name
pub fn format_rows_json(
    doc: &LogDocument,
    view: ViewId,
    columns: &[usize],
    rows: Range<usize>,
) -> Result<String, DisplayError> {
    let schema = doc.store().columns();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let mut object = Map::new();
        object.insert("row".to_string(), json!(row));
        for &column in columns {
            let value = doc.column_value(view, row, column)?;
            object.insert(schema[column].name.to_lowercase(), serde_json::to_value(&value)?);
        }
        out.push(Value::Object(object));
    }

    Ok(serde_json::to_string_pretty(&out)?)
}

/// One line per view of the chain: id, filter and row count
pub fn format_view_chain(doc: &LogDocument, chain: &[ViewId]) -> String {
    let mut out = String::new();
    for id in chain {
        let Ok(view) = doc.view(*id) else {
            continue;
        };
        let filter = view.filter().map_or("<all records>", Filter::text);
        out.push_str(&format!("{id} {filter}: {} rows\n", view.total_count()));
    }
    out
}

/// The expression, a caret under the offending offset and the error
pub fn format_parse_error(text: &str, error: &FilterParseError) -> String {
    let column = text
        .get(..error.offset())
        .map_or(error.offset(), |prefix| prefix.chars().count());
    format!("{text}\n{}^\n{error}", " ".repeat(column))
}

pub fn format_filter_tree(filter: &Filter) -> String {
    let expression = filter.expression();
    format!(
        "Expression: {expression}\nTree:       {}\nPatterns:   {}\n",
        expression.to_sexpr(),
        expression.leaf_count()
    )
}

/// Drain a progress sequence behind a progress bar. Returns the number of
/// checkpoints reached.
pub fn drive_progress(progress: impl Iterator<Item = u8>, message: &str, visible: bool) -> usize {
    let bar = if visible {
        ProgressBar::new(100)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template("{msg:>12} [{bar:40}] {pos:>3}%") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(message.to_string());

    let mut checkpoints = 0;
    for percent in progress {
        bar.set_position(u64::from(percent));
        checkpoints += 1;
    }
    bar.finish_and_clear();
    checkpoints
}
