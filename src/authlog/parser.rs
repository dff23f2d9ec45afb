//! Loader for saved authentication log exports.
//!
//! Accepts three layouts so logs can be replayed offline:
//!
//! - a full API response body (`{"stat": "OK", "response": {"authlogs": [...]}}`)
//! - a JSON array of records, or an object with an `authlogs` array
//! - newline-delimited JSON, one record per line

use crate::utils::reader::read_to_string;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Records loaded from one file, plus how many NDJSON lines were unusable.
#[derive(Debug, Default)]
pub struct LoadedLog {
    pub records: Vec<Value>,
    pub skipped_lines: usize,
}

pub fn load_records(path: impl AsRef<Path>) -> Result<LoadedLog> {
    let path = path.as_ref();
    let contents = read_to_string(path)?;
    parse_records(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_records(contents: &str) -> Result<LoadedLog> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(LoadedLog::default());
    }

    if let Ok(document) = serde_json::from_str::<Value>(trimmed) {
        return Ok(LoadedLog {
            records: unwrap_document(document),
            skipped_lines: 0,
        });
    }

    let mut loaded = LoadedLog::default();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(record @ Value::Object(_)) => loaded.records.push(record),
            _ => loaded.skipped_lines += 1,
        }
    }

    if loaded.records.is_empty() {
        anyhow::bail!("No JSON authentication log records found");
    }
    Ok(loaded)
}

fn unwrap_document(document: Value) -> Vec<Value> {
    match document {
        Value::Array(records) => records,
        Value::Object(mut map) => {
            if let Some(Value::Object(mut response)) = map.remove("response") {
                if let Some(Value::Array(records)) = response.remove("authlogs") {
                    return records;
                }
                return vec![Value::Object(response)];
            }
            if let Some(Value::Array(records)) = map.remove("authlogs") {
                return records;
            }
            vec![Value::Object(map)]
        }
        other => vec![other],
    }
}
