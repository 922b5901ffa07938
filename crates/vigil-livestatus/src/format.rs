//! Response body rendering: csv, json, wrapped_json, and the fixed16
//! status header.

use crate::engine::ResultSet;

/// Output formats accepted by `OutputFormat:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    WrappedJson,
    /// Same wire form as `json`.
    Python,
}

impl OutputFormat {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "wrapped_json" => Some(Self::WrappedJson),
            "python" | "python3" => Some(Self::Python),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::WrappedJson => "wrapped_json",
            Self::Python => "python",
        }
    }
}

/// `ResponseHeader:` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHeader {
    Off,
    Fixed16,
}

impl ResponseHeader {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "off" | "" => Some(Self::Off),
            "fixed16" => Some(Self::Fixed16),
            _ => None,
        }
    }
}

/// Render a result set in the requested format. The body always ends in a
/// newline.
pub fn render(result: &ResultSet, format: OutputFormat, column_headers: bool) -> String {
    match format {
        OutputFormat::Csv => render_csv(result, column_headers),
        OutputFormat::Json | OutputFormat::Python => render_json(result, column_headers),
        OutputFormat::WrappedJson => render_wrapped_json(result, column_headers),
    }
}

fn render_csv(result: &ResultSet, column_headers: bool) -> String {
    let mut out = String::new();
    if column_headers && !result.columns.is_empty() {
        out.push_str(&result.columns.join(";"));
        out.push('\n');
    }
    for row in &result.rows {
        let fields: Vec<String> = row.iter().map(super::value::Value::csv_field).collect();
        out.push_str(&fields.join(";"));
        out.push('\n');
    }
    out
}

fn json_rows(result: &ResultSet, column_headers: bool) -> Vec<serde_json::Value> {
    let mut rows = Vec::with_capacity(result.rows.len() + 1);
    if column_headers && !result.columns.is_empty() {
        rows.push(serde_json::Value::from(result.columns.clone()));
    }
    for row in &result.rows {
        let cells: Vec<serde_json::Value> =
            row.iter().map(super::value::Value::to_json).collect();
        rows.push(serde_json::Value::from(cells));
    }
    rows
}

fn render_json(result: &ResultSet, column_headers: bool) -> String {
    let mut out = serde_json::Value::from(json_rows(result, column_headers)).to_string();
    out.push('\n');
    out
}

fn render_wrapped_json(result: &ResultSet, column_headers: bool) -> String {
    let mut object = serde_json::Map::new();
    object.insert(
        "data".to_string(),
        serde_json::Value::from(json_rows(result, false)),
    );
    object.insert(
        "total_count".to_string(),
        serde_json::Value::from(result.total_count),
    );
    if column_headers {
        object.insert(
            "columns".to_string(),
            serde_json::Value::from(result.columns.clone()),
        );
    }
    let mut out = serde_json::Value::Object(object).to_string();
    out.push('\n');
    out
}

/// The 16-byte `"%3d %11d\n"` status/length header.
pub fn fixed16(status: u16, body_len: usize) -> String {
    format!("{status:3} {body_len:11}\n")
}
