//! Number and cell formatting helpers shared by the log summaries and the
//! CSV writer.

use serde_json::Value;

/// Formats a number with comma separators for thousands.
///
/// # Examples
///
/// ```
/// use travel_audit_tools::utils::format::format_number;
///
/// assert_eq!(format_number(1234), "1,234");
/// assert_eq!(format_number(42), "42");
/// ```
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Render a flattened JSON leaf as a CSV cell.
///
/// Strings are written bare, `null` becomes an empty cell, and arrays or
/// objects that survived flattening are kept as compact JSON.
pub fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
