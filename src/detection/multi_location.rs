//! Keeps only users seen at more than one location.

use crate::authlog::types::{AuthEvent, UserTimeline};
use crate::error::{AuditError, Result};
use std::collections::{HashMap, HashSet};

/// Events of every multi-location user, plus their timelines for detection.
#[derive(Debug)]
pub struct MultiLocationSet {
    /// Grouped by user in first-seen order; each group keeps input order.
    pub events: Vec<AuthEvent>,
    pub timelines: Vec<UserTimeline>,
    pub users_seen: usize,
}

/// Group by user and retain the groups spanning two or more locations.
///
/// Fails with [`AuditError::NoMultiLocationUsers`] when nothing qualifies.
pub fn retain_multi_location(events: Vec<AuthEvent>) -> Result<MultiLocationSet> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<AuthEvent>> = Vec::new();

    for event in events {
        let slot = match index.get(&event.user_id) {
            Some(&slot) => slot,
            None => {
                index.insert(event.user_id.clone(), groups.len());
                groups.push(Vec::new());
                groups.len() - 1
            }
        };
        groups[slot].push(event);
    }

    let users_seen = groups.len();
    let mut retained = Vec::new();
    let mut timelines = Vec::new();

    for group in groups {
        let locations: HashSet<&str> = group.iter().map(|e| e.location.as_str()).collect();
        if locations.len() < 2 {
            continue;
        }
        timelines.push(UserTimeline::most_recent_first(&group[0].user_id, &group));
        retained.extend(group);
    }

    if retained.is_empty() {
        return Err(AuditError::NoMultiLocationUsers);
    }

    Ok(MultiLocationSet {
        events: retained,
        timelines,
        users_seen,
    })
}
