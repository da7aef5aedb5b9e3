//! Output formatting: table, JSON, YAML.
//!
//! Payloads are arbitrary JSON, so tables are built dynamically: objects
//! become field/value rows and everything else is shown as pretty JSON.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use tabled::{builder::Builder, settings::Style};

use storng_core::Entry;

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render any serializable item in the chosen format.
///
/// `table_fn` produces the table view from the item.
pub fn render<T: Serialize>(
    format: OutputFormat,
    data: &T,
    table_fn: impl Fn(&T) -> Result<String, CliError>,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => table_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(render_err),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(render_err),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(render_err),
    }
}

/// Render a response payload.
pub fn render_value(format: OutputFormat, value: &Value) -> Result<String, CliError> {
    render(format, value, value_table)
}

/// Render an entry together with its remote state.
pub fn render_entry(format: OutputFormat, entry: &Entry) -> Result<String, CliError> {
    render(format, entry, entry_table)
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Table views ──────────────────────────────────────────────────────

fn value_table(value: &Value) -> Result<String, CliError> {
    match value {
        Value::Object(map) if !map.is_empty() => {
            let rows = map
                .iter()
                .map(|(key, value)| Ok([key.clone(), cell(value)?]))
                .collect::<Result<Vec<_>, CliError>>()?;
            Ok(table(["Field", "Value"], rows))
        }
        Value::Null => Ok(String::new()),
        other => serde_json::to_string_pretty(other).map_err(render_err),
    }
}

fn entry_table(entry: &Entry) -> Result<String, CliError> {
    let status = &entry.loading_status;
    let mut rows = vec![
        ["state".to_owned(), entry.remote().label().to_owned()],
        ["loading".to_owned(), status.is_loading.to_string()],
        ["loaded".to_owned(), status.is_loaded.to_string()],
    ];
    if let Some(ref error) = status.error {
        rows.push(["error".to_owned(), error.message.clone()]);
    }
    rows.push(["data".to_owned(), cell(&entry.data)?]);
    Ok(table(["Field", "Value"], rows))
}

fn table<const N: usize>(header: [&str; N], rows: Vec<[String; N]>) -> String {
    let mut builder = Builder::default();
    builder.push_record(header.map(str::to_owned));
    for row in rows {
        builder.push_record(row);
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Strings unquoted, everything else as compact JSON.
fn cell(value: &Value) -> Result<String, CliError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other).map_err(render_err),
    }
}

fn render_err(err: impl std::fmt::Display) -> CliError {
    CliError::Render {
        reason: err.to_string(),
    }
}
