//! Delimited-Text Export
//!
//! Renders a fetched record sequence as CSV for external spreadsheet
//! tooling. This is a boundary contract and must stay byte-stable:
//!
//! - Columns: `id`, `received_at`, then each schema field in declaration
//!   order
//! - A value is rendered as its literal text; array/object fields as their
//!   serialized JSON form
//! - Any rendered value containing a comma, quote, or line break is wrapped
//!   in quotes with internal quotes doubled
//! - `received_at` is rendered as RFC 3339 with millisecond precision
//! - Rows are terminated with `\n`, header row included

use crate::record::StoredRecord;
use crate::schema::Schema;
use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

/// Render records to CSV following the topic's schema order.
pub fn render_csv(schema: &Schema, records: &[StoredRecord]) -> String {
    let mut out = String::new();

    out.push_str("id,received_at");
    for field in schema.fields() {
        out.push(',');
        out.push_str(&escape(&field.name));
    }
    out.push('\n');

    for record in records {
        out.push_str(&record.id.to_string());
        out.push(',');
        out.push_str(&escape(&format_received_at(record.received_at)));
        for field in schema.fields() {
            out.push(',');
            let rendered = record
                .fields
                .get(&field.name)
                .map(render_value)
                .unwrap_or_default();
            out.push_str(&escape(&rendered));
        }
        out.push('\n');
    }

    out
}

/// Literal text form of one field value.
fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Serializing a Value cannot fail
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn format_received_at(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => millis.to_string(),
    }
}

/// Quote a field when it contains a comma, quote, or line break; double any
/// internal quotes.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        let mut quoted = String::with_capacity(field.len() + 2);
        quoted.push('"');
        for c in field.chars() {
            if c == '"' {
                quoted.push('"');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    } else {
        field.to_string()
    }
}
