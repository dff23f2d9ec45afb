use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// UTC range `[now - days, now]` that logs are pulled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn ending_at(end: DateTime<Utc>, days_to_go_back: u32) -> Result<Self> {
        let start = Duration::try_days(i64::from(days_to_go_back))
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| anyhow!("Lookback of {} days is out of range", days_to_go_back))?;
        Ok(Self { start, end })
    }

    pub fn ending_now(days_to_go_back: u32) -> Result<Self> {
        Self::ending_at(Utc::now(), days_to_go_back)
    }

    pub fn min_time_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn max_time_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

/// Parse an RFC 3339 timestamp such as Duo's `isotimestamp`
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .with_context(|| format!("Failed to parse timestamp: {}", ts))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert epoch seconds, possibly fractional, to a UTC timestamp
pub fn from_epoch_seconds(secs: f64) -> Result<DateTime<Utc>> {
    if !secs.is_finite() {
        return Err(anyhow!("Epoch timestamp is not a finite number"));
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
        .single()
        .ok_or_else(|| anyhow!("Epoch timestamp out of range: {}", secs))
}

/// Format a timestamp for display
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render a gap between two logins in human-readable form
pub fn duration_human(duration: Duration) -> String {
    let seconds = duration.num_seconds().abs();

    if seconds < 60 {
        format!("{} seconds", seconds)
    } else if seconds < 3600 {
        format!("{} minutes", seconds / 60)
    } else if seconds < 86400 {
        format!("{:.1} hours", seconds as f64 / 3600.0)
    } else {
        format!("{:.1} days", seconds as f64 / 86400.0)
    }
}
