//! Rendering of hydrated entities for the terminal

use anyhow::{Context, Result};
use colored::*;
use serde_json::{Map, Value};

use c4c_odata::api::Entity;

const MAX_CELL_WIDTH: usize = 40;

/// Pretty printed JSON array of the entities
pub fn render_json(entities: &[Entity]) -> Result<String> {
    serde_json::to_string_pretty(entities).context("Failed to format JSON output")
}

/// Plain text table, one row per entity
///
/// Columns follow `columns` when given, otherwise the scalar properties of the
/// first entity. Cells longer than the maximum width are cut with `...`.
pub fn render_table(entities: &[Entity], columns: &[String]) -> Result<String> {
    let rows = entities
        .iter()
        .map(|entity| match serde_json::to_value(entity) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(e) => Err(e).context("Failed to serialize entity"),
        })
        .collect::<Result<Vec<_>>>()?;

    if rows.is_empty() {
        return Ok(format!("{}", "No records".dimmed()));
    }

    let columns: Vec<String> = if columns.is_empty() {
        default_columns(&rows[0])
    } else {
        columns.to_vec()
    };

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| truncate(&cell_text(row.get(column))))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| pad(column, *width).bold().to_string())
        .collect();
    out.push_str(&header.join("  "));
    out.push('\n');

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }

    Ok(out.trim_end().to_string())
}

/// Scalar properties in payload order, `ObjectID` first
fn default_columns(row: &Map<String, Value>) -> Vec<String> {
    let mut columns: Vec<String> = row
        .iter()
        .filter(|(key, value)| !key.starts_with("__") && !value.is_object() && !value.is_array())
        .map(|(key, _)| key.clone())
        .collect();

    if let Some(index) = columns.iter().position(|c| c == "ObjectID") {
        let id = columns.remove(index);
        columns.insert(0, id);
    }
    columns
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.replace('\n', " "),
        Some(Value::Object(obj)) if obj.contains_key("__deferred") => "<deferred>".to_string(),
        Some(other) => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{}...", cut)
}

fn pad(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}
