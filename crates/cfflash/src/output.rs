//! Rendering for `--output`.
//!
//! Tables for people, serde formats for scripts, and `plain` for piping
//! one identifier per line.

use std::io::{self, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render a collection. `to_row` builds the table row, `label` the
/// `plain` line of one item.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    label: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => Ok(Table::new(data.iter().map(to_row))
            .with(Style::rounded())
            .to_string()),
        OutputFormat::Plain => Ok(data.iter().map(label).collect::<Vec<_>>().join("\n")),
        structured => serialize(structured, data),
    }
}

/// Render one item; `table` shows the pre-formatted `detail` text.
pub fn render_single<T: Serialize>(
    format: &OutputFormat,
    data: &T,
    detail: impl FnOnce(&T) -> String,
    label: impl FnOnce(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(detail(data)),
        OutputFormat::Plain => Ok(label(data)),
        structured => serialize(structured, data),
    }
}

/// Write to stdout unless quiet or there is nothing to show.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{output}");
}

fn serialize<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
    };
    rendered.map_err(|e| CliError::Internal(format!("failed to render output: {e}")))
}
