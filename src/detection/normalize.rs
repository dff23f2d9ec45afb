//! Turns raw API records into the deduplicated [`AuthEvent`] set.
//!
//! Steps run in a fixed order because it changes the result: a duplicate
//! timestamp is resolved before records without a location are dropped, so
//! a location-less first occurrence still shadows a later copy.

use crate::authlog::types::{AuthEvent, FlatEvent};
use crate::config::DetectionConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

/// What normalization removed, for the run log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeStats {
    pub input: usize,
    pub duplicate_timestamps: usize,
    pub missing_location: usize,
    pub excluded_accounts: usize,
    pub missing_user: usize,
}

#[derive(Debug)]
pub struct Normalized {
    pub events: Vec<AuthEvent>,
    pub stats: NormalizeStats,
}

pub fn normalize(records: Vec<Value>, config: &DetectionConfig) -> Result<Normalized> {
    let mut stats = NormalizeStats {
        input: records.len(),
        ..NormalizeStats::default()
    };

    let flat = records
        .into_iter()
        .map(FlatEvent::from_record)
        .collect::<Result<Vec<_>>>()?;

    let mut seen: HashSet<DateTime<Utc>> = HashSet::with_capacity(flat.len());
    let mut events = Vec::with_capacity(flat.len());

    for event in flat {
        if !seen.insert(event.timestamp) {
            stats.duplicate_timestamps += 1;
            continue;
        }

        let Some(location) = event.location else {
            stats.missing_location += 1;
            continue;
        };

        let Some(user_id) = event.user_id else {
            stats.missing_user += 1;
            continue;
        };

        if config.is_excluded(&user_id) {
            stats.excluded_accounts += 1;
            continue;
        }

        events.push(AuthEvent {
            user_id,
            timestamp: event.timestamp,
            location,
            fields: event.fields,
        });
    }

    Ok(Normalized { events, stats })
}
