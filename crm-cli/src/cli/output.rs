//! Result formatting for the terminal

use std::fmt::Display;

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use serde_json::Value;

use crm_cli::api::BatchOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    JsonCompact,
    Csv,
}

/// Format query results according to the specified output format
pub fn format_output(data: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).context("Failed to format JSON output"),
        OutputFormat::JsonCompact => serde_json::to_string(data).context("Failed to format JSON output"),
        OutputFormat::Csv => json_to_csv(data),
    }
}

/// Records become rows, a single object becomes `key,value` pairs
fn json_to_csv(data: &Value) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    match data {
        Value::Array(rows) => {
            if rows.is_empty() {
                return Ok("No data\n".to_string());
            }

            let mut headers: Vec<&str> = Vec::new();
            for row in rows {
                if let Value::Object(obj) = row {
                    for key in obj.keys() {
                        if !headers.contains(&key.as_str()) {
                            headers.push(key);
                        }
                    }
                }
            }

            if headers.is_empty() {
                writer.write_record(["value"])?;
                for row in rows {
                    writer.write_record([cell(row)])?;
                }
            } else {
                writer.write_record(&headers)?;
                for row in rows {
                    let record: Vec<String> = headers
                        .iter()
                        .map(|h| row.get(*h).map(cell).unwrap_or_default())
                        .collect();
                    writer.write_record(&record)?;
                }
            }
        }
        Value::Object(obj) => {
            writer.write_record(["key", "value"])?;
            for (key, value) in obj {
                writer.write_record([key.clone(), cell(value)])?;
            }
        }
        other => {
            writer.write_record(["value"])?;
            writer.write_record([cell(other)])?;
        }
    }

    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Print one line per batch item plus a summary
pub fn print_batch_report<K: Display, T>(action: &str, outcomes: &[BatchOutcome<K, T>]) -> (usize, usize) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(_) => println!("  {} {}", "✓".bright_green(), outcome.key),
            Err(e) => println!("  {} {}: {}", "✗".bright_red(), outcome.key, e.to_string().dimmed()),
        }
    }

    let (succeeded, failed) = crm_cli::api::log_outcomes(action, outcomes);
    let summary = format!("{} succeeded, {} failed", succeeded, failed);
    if failed == 0 {
        println!("{}", summary.bright_green().bold());
    } else {
        println!("{}", summary.bright_red().bold());
    }
    (succeeded, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_csv_rows_use_union_of_keys() {
        let data = json!([
            {"title": "First, with comma", "ticketnumber": "CAS-1"},
            {"title": "Second", "contact": {"fullname": "Anna"}}
        ]);
        let csv = format_output(&data, OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "ticketnumber,title,contact");
        assert_eq!(lines[1], r#"CAS-1,"First, with comma","#);
        assert_eq!(lines[2], r#",Second,"{""fullname"":""Anna""}""#);
    }

    #[test]
    fn test_csv_object_and_empty() {
        let csv = format_output(&json!({"count": 2}), OutputFormat::Csv).unwrap();
        assert_eq!(csv, "key,value\ncount,2\n");
        assert_eq!(format_output(&json!([]), OutputFormat::Csv).unwrap(), "No data\n");
    }

    #[test]
    fn test_json_compact() {
        assert_eq!(
            format_output(&json!({"a": [1, 2]}), OutputFormat::JsonCompact).unwrap(),
            r#"{"a":[1,2]}"#
        );
    }
}
