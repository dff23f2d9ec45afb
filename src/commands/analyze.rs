//! Offline replay of saved authentication log exports.
//!
//! Runs the same normalization, filtering and detection as `detect` on
//! files instead of the live API. Useful for re-checking an incident window
//! with a different threshold, or for auditing logs exported elsewhere.
//!
//! # Usage
//!
//! ```bash
//! travel-audit analyze authlogs-2025-10-06.json.gz authlogs-2025-10-07.ndjson \
//!     --hours-to-compare 4 --output review.csv
//! ```
//!
//! Accepted layouts are described in [`crate::authlog::parser`].

use crate::authlog::parser::load_records;
use crate::config::DetectionConfig;
use crate::detection::{analyze_records, DetectionOutcome, RunContext};
use crate::report;
use crate::utils::format::format_number;
use anyhow::Result;

pub fn run(
    log_files: &[String],
    config: &DetectionConfig,
    output: &str,
    flagged_output: Option<&str>,
) -> Result<DetectionOutcome> {
    let ctx = RunContext::new(false);
    config.validate()?;

    let mut records = Vec::new();
    for (file_idx, log_file) in log_files.iter().enumerate() {
        let loaded = load_records(log_file)?;
        log::info!(
            "[{}/{}] Loaded {} records from {}",
            file_idx + 1,
            log_files.len(),
            format_number(loaded.records.len()),
            log_file
        );
        if loaded.skipped_lines > 0 {
            log::warn!(
                "Skipped {} unparseable lines in {}",
                format_number(loaded.skipped_lines),
                log_file
            );
        }
        records.extend(loaded.records);
    }

    let outcome = analyze_records(records, config, &ctx)?;
    report::emit(&outcome, output, flagged_output, &ctx)?;
    Ok(outcome)
}
