//! Data structures for Duo authentication log records.
//!
//! The API returns nested JSON objects. They are flattened into dotted keys
//! (`access_device.location.state`) so every record has the same tabular
//! shape, then the three fields detection needs are lifted out as typed
//! values. Everything else rides along untouched for the review file.

use crate::error::{AuditError, Result};
use crate::utils::format::value_to_cell;
use crate::utils::time::{from_epoch_seconds, parse_timestamp};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Flattened key holding the login name.
pub const USER_FIELD: &str = "user.name";
/// Flattened key holding the coarse location (state / region).
pub const LOCATION_FIELD: &str = "access_device.location.state";
/// RFC 3339 timestamp with sub-second precision.
pub const ISO_TIMESTAMP_FIELD: &str = "isotimestamp";
/// Epoch seconds, used when `isotimestamp` is absent.
pub const EPOCH_TIMESTAMP_FIELD: &str = "timestamp";

/// Passthrough columns keyed by flattened field name.
pub type Fields = BTreeMap<String, Value>;

/// Flatten a nested JSON object into dotted keys.
///
/// Arrays, scalars and `null` are leaves; only objects are descended into.
/// An empty nested object produces no columns.
pub fn flatten(record: Value) -> Result<Fields> {
    match record {
        Value::Object(map) => {
            let mut out = Fields::new();
            flatten_into("", map, &mut out);
            Ok(out)
        }
        other => Err(AuditError::DataShape(format!(
            "expected an authentication log object, got {}",
            json_kind(&other)
        ))),
    }
}

fn flatten_into(prefix: &str, map: Map<String, Value>, out: &mut Fields) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) => flatten_into(&path, inner, out),
            leaf => {
                out.insert(path, leaf);
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A flattened record before normalization.
///
/// `timestamp` is already required here; user and location may still be
/// missing.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEvent {
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
    pub fields: Fields,
}

impl FlatEvent {
    pub fn from_record(record: Value) -> Result<Self> {
        let mut fields = flatten(record)?;
        let timestamp = extract_timestamp(&fields)?;
        let user_id = take_text(&mut fields, USER_FIELD)?;
        let location = take_text(&mut fields, LOCATION_FIELD)?;

        Ok(Self {
            user_id,
            timestamp,
            location,
            fields,
        })
    }
}

fn extract_timestamp(fields: &Fields) -> Result<DateTime<Utc>> {
    if let Some(Value::String(iso)) = fields.get(ISO_TIMESTAMP_FIELD) {
        return parse_timestamp(iso).map_err(|e| AuditError::DataShape(format!("{:#}", e)));
    }

    let secs = match fields.get(EPOCH_TIMESTAMP_FIELD) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match secs {
        Some(secs) => {
            from_epoch_seconds(secs).map_err(|e| AuditError::DataShape(format!("{:#}", e)))
        }
        None => Err(AuditError::DataShape(format!(
            "event has neither `{}` nor a numeric `{}`",
            ISO_TIMESTAMP_FIELD, EPOCH_TIMESTAMP_FIELD
        ))),
    }
}

/// Remove a text column, mapping null and blank strings to `None`.
fn take_text(fields: &mut Fields, key: &str) -> Result<Option<String>> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(other @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(value_to_cell(&other))),
        Some(other) => Err(AuditError::DataShape(format!(
            "`{}` should be text, got {}",
            key,
            json_kind(&other)
        ))),
    }
}

/// One authentication attempt that survived normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    /// Every other flattened field of the record.
    pub fields: Fields,
}

/// Time-ordered `(timestamp, location)` pairs for a single user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserTimeline {
    pub user_id: String,
    pub entries: Vec<(DateTime<Utc>, String)>,
}

impl UserTimeline {
    /// Build a timeline from one user's events, most recent first.
    pub fn most_recent_first<'a>(
        user_id: &str,
        events: impl IntoIterator<Item = &'a AuthEvent>,
    ) -> Self {
        let mut entries: Vec<_> = events
            .into_iter()
            .map(|e| (e.timestamp, e.location.clone()))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Self {
            user_id: user_id.to_string(),
            entries,
        }
    }
}

/// Admin API version of the authentication log endpoint.
pub const AUTH_LOG_API_VERSION: u8 = 2;

/// Parameters of one authentication log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub api_version: u8,
    pub min_time_ms: i64,
    pub max_time_ms: i64,
    pub limit: u32,
}

/// Opaque cursor returned by the API while more pages remain.
///
/// Duo hands back a list of strings (`[timestamp, txid]`) which is sent back
/// comma-joined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContinuationToken(pub Vec<String>);

impl ContinuationToken {
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|part| part.is_empty())
    }

    pub fn to_param(&self) -> String {
        self.0.join(",")
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

/// A single page of raw records.
#[derive(Debug, Clone, Default)]
pub struct AuthLogPage {
    pub events: Vec<Value>,
    pub next_token: Option<ContinuationToken>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "user": {"name": "alice", "key": "DU123"},
            "access_device": {
                "ip": "10.0.0.1",
                "location": {"city": "Fresno", "state": "California", "country": "US"}
            },
            "isotimestamp": "2025-10-07T12:00:00.250000+00:00",
            "timestamp": 1759838400,
            "result": "success",
            "factor": "duo_push",
            "email": null
        })
    }

    #[test]
    fn test_flatten_uses_dotted_keys() {
        let fields = flatten(sample()).unwrap();
        assert_eq!(fields["user.name"], json!("alice"));
        assert_eq!(fields["access_device.location.state"], json!("California"));
        assert_eq!(fields["email"], Value::Null);
        assert!(!fields.contains_key("access_device"));
    }

    #[test]
    fn test_flatten_rejects_non_objects() {
        assert!(matches!(
            flatten(json!([1, 2])),
            Err(AuditError::DataShape(_))
        ));
    }

    #[test]
    fn test_from_record_lifts_typed_fields() {
        let event = FlatEvent::from_record(sample()).unwrap();
        assert_eq!(event.user_id.as_deref(), Some("alice"));
        assert_eq!(event.location.as_deref(), Some("California"));
        assert_eq!(event.timestamp.timestamp_subsec_millis(), 250);
        assert!(!event.fields.contains_key(USER_FIELD));
        assert!(!event.fields.contains_key(LOCATION_FIELD));
        assert_eq!(event.fields["access_device.location.city"], json!("Fresno"));
    }

    #[test]
    fn test_epoch_timestamp_fallback() {
        let event = FlatEvent::from_record(json!({
            "user": {"name": "bob"},
            "timestamp": 1700000000
        }))
        .unwrap();
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(event.location, None);
    }

    #[test]
    fn test_blank_location_is_absent() {
        let event = FlatEvent::from_record(json!({
            "user": {"name": "bob"},
            "access_device": {"location": {"state": "  "}},
            "timestamp": 1700000000
        }))
        .unwrap();
        assert_eq!(event.location, None);
    }

    #[test]
    fn test_missing_timestamp_is_data_shape_error() {
        let err = FlatEvent::from_record(json!({"user": {"name": "bob"}})).unwrap_err();
        assert!(matches!(err, AuditError::DataShape(_)));
    }

    #[test]
    fn test_timeline_is_most_recent_first() {
        let mk = |ts: i64, loc: &str| AuthEvent {
            user_id: "u".to_string(),
            timestamp: from_epoch_seconds(ts as f64).unwrap(),
            location: loc.to_string(),
            fields: Fields::new(),
        };
        let events = [mk(100, "A"), mk(300, "B"), mk(200, "C")];
        let timeline = UserTimeline::most_recent_first("u", events.iter());
        let locations: Vec<_> = timeline.entries.iter().map(|e| e.1.as_str()).collect();
        assert_eq!(locations, ["B", "C", "A"]);
    }

    #[test]
    fn test_continuation_token() {
        let token = ContinuationToken(vec!["1700000000000".into(), "txid-1".into()]);
        assert!(!token.is_empty());
        assert_eq!(token.to_param(), "1700000000000,txid-1");
        assert!(ContinuationToken::default().is_empty());
        assert!(ContinuationToken(vec![String::new()]).is_empty());
    }
}
