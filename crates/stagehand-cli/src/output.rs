//! Output formatting for CLI

use console::style;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Print rows in the selected format; `line` renders one row as text
pub fn print_rows<T>(rows: Vec<T>, format: &str, line: impl Fn(&T) -> String) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
{
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => println!("{}", Table::new(rows).with(Style::rounded())),
        OutputFormat::Text => {
            for row in &rows {
                println!("{}", line(row));
            }
        }
    }
    Ok(())
}

/// Print a single value; text falls back to pretty JSON
pub fn print_value<T: Serialize>(value: &T, format: &str) -> anyhow::Result<()> {
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Table | OutputFormat::Text => {
            println!("{}", serde_json::to_string_pretty(value)?)
        }
    }
    Ok(())
}

/// Section heading for text output
pub fn heading(text: &str) -> String {
    style(text).bold().cyan().to_string()
}

pub fn ok(text: &str) -> String {
    style(text).green().to_string()
}

pub fn warn(text: &str) -> String {
    style(text).yellow().to_string()
}

pub fn fail(text: &str) -> String {
    style(text).red().bold().to_string()
}
