//! Flags users whose consecutive logins change location faster than the
//! configured threshold.
//!
//! Each timeline is walked most recent first. With the default
//! [`PairingStrategy::Disjoint`] positions are paired `(0, 1)`, `(2, 3)`, ...
//! so an odd trailing event is never examined and a change between positions
//! 1 and 2 goes unnoticed. [`PairingStrategy::Sliding`] compares every
//! neighbour pair instead.

use crate::authlog::types::UserTimeline;
use crate::config::{DetectionConfig, PairingStrategy};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// One qualifying pair. A user appears once per pair that trips the check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagResult {
    pub user_id: String,
    pub newer_at: DateTime<Utc>,
    pub newer_location: String,
    pub older_at: DateTime<Utc>,
    pub older_location: String,
    #[serde(serialize_with = "serialize_gap_seconds", rename = "gap_seconds")]
    pub gap: Duration,
}

fn serialize_gap_seconds<S: serde::Serializer>(gap: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(gap.num_milliseconds() as f64 / 1000.0)
}

pub struct ImpossibleTravelDetector {
    threshold: Duration,
    pairing: PairingStrategy,
}

impl ImpossibleTravelDetector {
    pub fn new(threshold: Duration, pairing: PairingStrategy) -> Self {
        Self { threshold, pairing }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.compare_window(), config.pairing)
    }

    /// Check every timeline, returning flags in timeline order.
    pub fn detect(&self, timelines: &[UserTimeline]) -> Vec<FlagResult> {
        timelines
            .iter()
            .flat_map(|timeline| self.check_timeline(timeline))
            .collect()
    }

    /// Check one user. Entries must already be most recent first.
    pub fn check_timeline(&self, timeline: &UserTimeline) -> Vec<FlagResult> {
        let step = match self.pairing {
            PairingStrategy::Disjoint => 2,
            PairingStrategy::Sliding => 1,
        };

        timeline
            .entries
            .windows(2)
            .step_by(step)
            .filter_map(|pair| {
                let (newer_at, newer_location) = &pair[0];
                let (older_at, older_location) = &pair[1];
                let gap = (*newer_at - *older_at).abs();

                (gap < self.threshold && newer_location != older_location).then(|| FlagResult {
                    user_id: timeline.user_id.clone(),
                    newer_at: *newer_at,
                    newer_location: newer_location.clone(),
                    older_at: *older_at,
                    older_location: older_location.clone(),
                    gap,
                })
            })
            .collect()
    }
}

/// User ids in flag order, repeats included.
pub fn flagged_users(flags: &[FlagResult]) -> Vec<&str> {
    flags.iter().map(|f| f.user_id.as_str()).collect()
}
