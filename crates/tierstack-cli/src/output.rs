//! Formatted output helpers for CLI commands.

use std::fmt::Write as _;

use tierstack_compose::ResolvedOutputs;
use tierstack_provider::record::ResourceRecord;

/// Returns a horizontal rule `width` characters wide.
#[must_use]
pub fn rule(width: usize) -> String {
    "\u{2550}".repeat(width)
}

/// Formats one plan entry: a header line, then its scalar properties.
///
/// Resources that already exist (the provider's default network) are
/// marked `=` instead of `+`.
#[must_use]
pub fn format_record(record: &ResourceRecord) -> String {
    let existing = record
        .properties
        .get("default")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    let marker = if existing { '=' } else { '+' };

    let mut out = format!("  {marker} {} {}\n", record.kind, record.name);
    let _ = writeln!(out, "      id: {}", record.id);
    for (key, value) in &record.properties {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        let _ = writeln!(out, "      {key}: {value}");
    }
    out
}

/// Formats resolved stack outputs as aligned `name = value` lines.
#[must_use]
pub fn format_outputs(outputs: &ResolvedOutputs) -> String {
    [
        ("url", &outputs.url),
        ("api_url", &outputs.api_url),
        ("api_image", &outputs.api_image),
        ("web_image", &outputs.web_image),
    ]
    .iter()
    .fold(String::new(), |mut out, (name, value)| {
        let _ = writeln!(out, "{name:<10} = {value}");
        out
    })
}
