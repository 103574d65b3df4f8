//! Output formatters for use-case results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use recordlink_client::{Failure, Value};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format query rows under their column names.
    fn format_rows(&self, columns: &[String], rows: &[Vec<Value>]) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;

    /// Format a failure.
    fn format_error(&self, failure: &Failure) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_rows(&self, columns: &[String], rows: &[Vec<Value>]) -> String {
        let mut table = Table::new();
        table.set_header(columns.iter().map(Cell::new));
        for row in rows {
            table.add_row(row.iter().map(|value| Cell::new(value.to_string())));
        }
        format!("{}\n{} row(s)", table, rows.len())
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, failure: &Failure) -> String {
        format!("Error: {}", failure)
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_rows(&self, columns: &[String], rows: &[Vec<Value>]) -> String {
        let objects: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), value_to_json(value)))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::to_string_pretty(&objects).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({
            "message": message
        })
        .to_string()
    }

    fn format_error(&self, failure: &Failure) -> String {
        serde_json::json!({
            "error": {
                "code": failure.code,
                "message": failure.message,
            }
        })
        .to_string()
    }
}

/// CSV formatter.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_rows(&self, columns: &[String], rows: &[Vec<Value>]) -> String {
        let mut output = String::new();
        let header: Vec<String> = columns.iter().map(|c| csv_field(c)).collect();
        output.push_str(&header.join(","));
        output.push('\n');
        for row in rows {
            let cells: Vec<String> = row.iter().map(format_value_csv).collect();
            output.push_str(&cells.join(","));
            output.push('\n');
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, failure: &Failure) -> String {
        format!("code,message\n{},{}", failure.code, csv_field(&failure.message))
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn format_value_csv(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => csv_field(s),
        other => other.to_string(),
    }
}

/// Quote a field when it holds a separator, quote or line break.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", escape_csv(s))
    } else {
        s.to_string()
    }
}

/// Escape a string for CSV.
fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<String>, Vec<Vec<Value>>) {
        (
            vec!["CardCode".into(), "CardName".into()],
            vec![
                vec![Value::from("C20000"), Value::from("Norm Thompson")],
                vec![Value::from("C30000"), Value::from("Microchips, Ltd")],
            ],
        )
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("hello"), "hello");
        assert_eq!(escape_csv("say \"hi\""), "say \"\"hi\"\"");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("plain"), "plain");
    }

    #[test]
    fn test_table_output() {
        let (columns, rows) = sample();
        let output = TableFormatter.format_rows(&columns, &rows);
        assert!(output.contains("CardCode"));
        assert!(output.contains("Microchips, Ltd"));
        assert!(output.ends_with("2 row(s)"));
    }

    #[test]
    fn test_json_output() {
        let (columns, rows) = sample();
        let output = JsonFormatter.format_rows(&columns, &rows);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[1]["CardName"], "Microchips, Ltd");

        let failure = Failure {
            code: -2035,
            message: "duplicate".into(),
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_error(&failure)).unwrap();
        assert_eq!(parsed["error"]["code"], -2035);
    }

    #[test]
    fn test_csv_output() {
        let (columns, mut rows) = sample();
        rows.push(vec![Value::from("C40000"), Value::Null]);
        let output = CsvFormatter.format_rows(&columns, &rows);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "CardCode,CardName");
        assert_eq!(lines[2], "C30000,\"Microchips, Ltd\"");
        assert_eq!(lines[3], "C40000,");
    }

    #[test]
    fn test_empty_rows() {
        let output = JsonFormatter.format_rows(&["CardCode".to_string()], &[]);
        assert_eq!(output, "[]");
        let output = CsvFormatter.format_rows(&["CardCode".to_string()], &[]);
        assert_eq!(output, "CardCode\n");
    }
}
