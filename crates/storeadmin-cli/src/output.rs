//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a list either as JSON or as text rows produced by `row`
pub fn print_list<T: Serialize>(items: &[T], format: OutputFormat, row: impl Fn(&T) -> String) {
    match format {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("(none)");
            }
            for item in items {
                println!("{}", row(item));
            }
        }
        OutputFormat::Json => print_json(&items),
    }
}

/// Print a single record either as JSON or as label/value rows
pub fn print_record<T: Serialize>(item: &T, format: OutputFormat, rows: &[(&str, String)]) {
    match format {
        OutputFormat::Text => {
            for (label, value) in rows {
                print_row(label, value);
            }
        }
        OutputFormat::Json => print_json(item),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to render JSON: {}", e), OutputFormat::Text),
    }
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({"status": "success", "message": message}));
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({"status": "error", "message": message}));
        }
    }
}

/// Print a label/value row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<14} {}", format!("{}:", label), value);
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
