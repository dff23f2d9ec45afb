//! Detection options.
//!
//! The CLI fills a [`DetectionConfig`] from its flags; library callers can
//! start from [`DetectionConfig::default`] and override fields.

use crate::error::{AuditError, Result};
use chrono::Duration;
use std::collections::BTreeSet;

/// Service accounts that log in from many places by design.
pub const DEFAULT_EXCLUDED_ACCOUNTS: &[&str] = &["fimsusr"];

/// Largest page the authentication log endpoint accepts.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Duo keeps roughly six months of authentication logs.
pub const MAX_DAYS_TO_GO_BACK: u32 = 180;

/// Safety cap on pagination so a misbehaving API cannot loop forever.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// How time-adjacent events of one user are paired for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingStrategy {
    /// 1st with 2nd, 3rd with 4th, ... An odd trailing event is never
    /// compared, and a location change straddling two pairs is missed.
    #[default]
    Disjoint,
    /// Every neighbour pair: 1st with 2nd, 2nd with 3rd, ...
    Sliding,
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Size of the UTC lookback window ending now.
    pub days_to_go_back: u32,
    /// A location change faster than this many hours is flagged.
    pub hours_to_compare: f64,
    pub page_limit: u32,
    pub max_pages: usize,
    pub excluded_accounts: BTreeSet<String>,
    pub pairing: PairingStrategy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            days_to_go_back: 1,
            hours_to_compare: 2.0,
            page_limit: MAX_PAGE_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
            excluded_accounts: DEFAULT_EXCLUDED_ACCOUNTS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            pairing: PairingStrategy::Disjoint,
        }
    }
}

impl DetectionConfig {
    /// Add accounts on top of the built-in exclusion set.
    pub fn with_excluded<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_accounts
            .extend(accounts.into_iter().map(Into::into));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.days_to_go_back == 0 || self.days_to_go_back > MAX_DAYS_TO_GO_BACK {
            return Err(AuditError::Config(format!(
                "days_to_go_back must be between 1 and {}, got {}",
                MAX_DAYS_TO_GO_BACK, self.days_to_go_back
            )));
        }
        if !self.hours_to_compare.is_finite() || self.hours_to_compare <= 0.0 {
            return Err(AuditError::Config(format!(
                "hours_to_compare must be a positive number, got {}",
                self.hours_to_compare
            )));
        }
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_LIMIT {
            return Err(AuditError::Config(format!(
                "page_limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, self.page_limit
            )));
        }
        if self.max_pages == 0 {
            return Err(AuditError::Config(
                "max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The comparison threshold as a duration, rounded to the millisecond.
    pub fn compare_window(&self) -> Duration {
        Duration::milliseconds((self.hours_to_compare * 3_600_000.0).round() as i64)
    }

    pub fn is_excluded(&self, user_id: &str) -> bool {
        self.excluded_accounts.contains(user_id)
    }
}
