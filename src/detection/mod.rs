//! The impossible-travel pipeline.
//!
//! Data only moves forward:
//!
//! 1. [`fetch`] pages through the authentication log
//! 2. [`normalize`] flattens, deduplicates and drops unusable or excluded records
//! 3. [`multi_location`] keeps users seen at two or more locations
//! 4. [`impossible_travel`] compares time-adjacent logins of those users
//!
//! Every stage owns its input and hands the result on, so intermediate
//! collections are dropped as soon as the next stage has consumed them.

pub mod fetch;
pub mod impossible_travel;
pub mod multi_location;
pub mod normalize;

use crate::authlog::types::{AuthEvent, LogQuery, AUTH_LOG_API_VERSION};
use crate::config::{DetectionConfig, PairingStrategy};
use crate::error::Result;
use crate::utils::format::format_number;
use crate::utils::progress::PageProgress;
use crate::utils::time::LookbackWindow;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Instant;

pub use fetch::{fetch_all, AuthLogSource, FetchOutcome};
pub use impossible_travel::{flagged_users, FlagResult, ImpossibleTravelDetector};
pub use multi_location::{retain_multi_location, MultiLocationSet};
pub use normalize::{normalize, NormalizeStats, Normalized};

/// Per-run state handed to each stage instead of process globals.
#[derive(Debug, Clone)]
pub struct RunContext {
    started: Instant,
    started_at: DateTime<Utc>,
    show_progress: bool,
}

impl RunContext {
    pub fn new(show_progress: bool) -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            show_progress,
        }
    }

    /// Context that never draws a spinner.
    pub fn quiet() -> Self {
        Self::new(false)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.started.elapsed().as_secs_f64() / 60.0
    }

    pub(crate) fn page_progress(&self) -> PageProgress {
        if self.show_progress {
            PageProgress::new("Fetching authentication logs")
        } else {
            PageProgress::hidden()
        }
    }
}

/// Everything the emitter needs from a successful run.
#[derive(Debug)]
pub struct DetectionOutcome {
    /// Every event of every multi-location user, for the review file.
    pub retained: Vec<AuthEvent>,
    pub flags: Vec<FlagResult>,
    pub normalize_stats: NormalizeStats,
    pub users_seen: usize,
    pub multi_location_users: usize,
    pub truncated: bool,
}

impl DetectionOutcome {
    pub fn flagged_users(&self) -> Vec<&str> {
        flagged_users(&self.flags)
    }
}

/// Run normalization, filtering and detection over already-fetched records.
///
/// `config` is expected to have passed [`DetectionConfig::validate`].
pub fn analyze_records(
    records: Vec<Value>,
    config: &DetectionConfig,
    ctx: &RunContext,
) -> Result<DetectionOutcome> {
    let Normalized { events, stats } = normalize(records, config)?;
    log::info!(
        "Normalized {} of {} events ({} duplicate timestamps, {} without location, {} without user, {} excluded accounts)",
        format_number(events.len()),
        format_number(stats.input),
        format_number(stats.duplicate_timestamps),
        format_number(stats.missing_location),
        format_number(stats.missing_user),
        format_number(stats.excluded_accounts),
    );

    let MultiLocationSet {
        events: retained,
        timelines,
        users_seen,
    } = retain_multi_location(events)?;
    log::info!(
        "{} of {} users logged in from more than one location",
        format_number(timelines.len()),
        format_number(users_seen)
    );

    if config.pairing == PairingStrategy::Sliding {
        log::warn!("Comparing every adjacent login pair instead of disjoint pairs");
    }
    let flags = ImpossibleTravelDetector::from_config(config).detect(&timelines);
    log::debug!(
        "Detection finished {:.3} minutes into the run",
        ctx.elapsed_minutes()
    );

    Ok(DetectionOutcome {
        retained,
        flags,
        normalize_stats: stats,
        users_seen,
        multi_location_users: timelines.len(),
        truncated: false,
    })
}

/// Fetch the lookback window from `source` and analyze it.
pub async fn run<S>(
    source: &mut S,
    window: &LookbackWindow,
    config: &DetectionConfig,
    ctx: &RunContext,
) -> Result<DetectionOutcome>
where
    S: AuthLogSource + ?Sized,
{
    let query = LogQuery {
        api_version: AUTH_LOG_API_VERSION,
        min_time_ms: window.min_time_ms(),
        max_time_ms: window.max_time_ms(),
        limit: config.page_limit,
    };
    log::info!(
        "Pulling authentication logs from {} to {}",
        crate::utils::time::format_timestamp(&window.start),
        crate::utils::time::format_timestamp(&window.end)
    );

    let FetchOutcome {
        records, truncated, ..
    } = fetch_all(source, &query, config.max_pages, ctx).await?;

    let mut outcome = analyze_records(records, config, ctx)?;
    outcome.truncated = truncated;
    Ok(outcome)
}
