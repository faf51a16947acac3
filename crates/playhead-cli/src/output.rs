//! Output formatting for CLI

use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Print `data` as pretty JSON when requested.
///
/// Returns false for text output so the caller prints its own rendering.
pub fn print_json<T: Serialize>(data: &T, format: &str) -> anyhow::Result<bool> {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
            Ok(true)
        }
        OutputFormat::Text => Ok(false),
    }
}
