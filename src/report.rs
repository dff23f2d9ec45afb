//! Result emitter: the review CSV, the flagged-user log summary and an
//! optional JSON export of the flags.
//!
//! # Review file
//!
//! One row per retained event of every multi-location user, flagged or not,
//! so reviewers see the whole context. Columns:
//!
//! - `user_id`, `event_time` (RFC 3339), `location`
//! - every passthrough field of the flattened record, in sorted order;
//!   records lacking a field get an empty cell. A field named like one of
//!   the leading columns is written as `raw.<name>`.

use crate::authlog::types::AuthEvent;
use crate::detection::{DetectionOutcome, FlagResult, RunContext};
use crate::error::{AuditError, Result};
use crate::utils::format::{format_number, value_to_cell};
use crate::utils::time::{duration_human, format_timestamp};
use chrono::SecondsFormat;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::Path;

/// A flagged user with how many pairs tripped the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedUser {
    pub user_id: String,
    pub hits: usize,
}

/// Distinct flagged users, most hits first, ties by user id.
pub fn summarize_flags(flags: &[FlagResult]) -> Vec<FlaggedUser> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for flag in flags {
        *counts.entry(flag.user_id.as_str()).or_insert(0) += 1;
    }

    let mut users: Vec<FlaggedUser> = counts
        .into_iter()
        .map(|(user_id, hits)| FlaggedUser {
            user_id: user_id.to_string(),
            hits,
        })
        .collect();
    users.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.user_id.cmp(&b.user_id)));
    users
}

const LEADING_COLUMNS: [&str; 3] = ["user_id", "event_time", "location"];

/// Prefix for passthrough fields whose name is taken by a leading column.
const SHADOWED_PREFIX: &str = "raw.";

fn passthrough_keys(events: &[AuthEvent]) -> Vec<&str> {
    let keys: BTreeSet<&str> = events
        .iter()
        .flat_map(|e| e.fields.keys().map(String::as_str))
        .collect();
    keys.into_iter().collect()
}

fn passthrough_header(key: &str) -> String {
    if LEADING_COLUMNS.contains(&key) {
        format!("{}{}", SHADOWED_PREFIX, key)
    } else {
        key.to_string()
    }
}

/// Column order of the review file for `events`.
pub fn review_columns(events: &[AuthEvent]) -> Vec<String> {
    LEADING_COLUMNS
        .into_iter()
        .map(str::to_string)
        .chain(passthrough_keys(events).into_iter().map(passthrough_header))
        .collect()
}

/// Write the review rows as CSV to any writer.
pub fn write_events<W: Write>(writer: W, events: &[AuthEvent]) -> anyhow::Result<()> {
    let keys = passthrough_keys(events);
    for key in keys.iter().filter(|key| LEADING_COLUMNS.contains(*key)) {
        log::warn!(
            "Record field `{}` clashes with a review column, writing it as `{}{}`",
            key,
            SHADOWED_PREFIX,
            key
        );
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(review_columns(events))?;

    for event in events {
        let mut row = Vec::with_capacity(LEADING_COLUMNS.len() + keys.len());
        row.push(event.user_id.clone());
        row.push(event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        row.push(event.location.clone());
        for key in &keys {
            row.push(event.fields.get(*key).map(value_to_cell).unwrap_or_default());
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct FlagExport<'a> {
    generated_at: String,
    flagged_users: Vec<FlaggedUser>,
    flags: &'a [FlagResult],
}

/// The flags and their per-user summary as pretty JSON.
pub fn render_flags_json(flags: &[FlagResult], ctx: &RunContext) -> serde_json::Result<Vec<u8>> {
    let export = FlagExport {
        generated_at: ctx.started_at().to_rfc3339_opts(SecondsFormat::Secs, true),
        flagged_users: summarize_flags(flags),
        flags,
    };
    serde_json::to_vec_pretty(&export)
}

fn create_parent_dir(path: &str) -> Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| AuditError::sink(path, e))
        }
        _ => Ok(()),
    }
}

fn write_output(path: &str, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|e| AuditError::sink(path, e))
}

/// Log the flagged-user list and the per-pair details.
pub fn log_flags(outcome: &DetectionOutcome) {
    log::info!("List of users to review {:?}.", outcome.flagged_users());

    if outcome.flags.is_empty() {
        log::info!(
            "No impossible travel among {} multi-location users",
            format_number(outcome.multi_location_users)
        );
        return;
    }

    for user in summarize_flags(&outcome.flags) {
        log::info!("  {} flagged {} time(s)", user.user_id, user.hits);
    }
    for flag in &outcome.flags {
        log::debug!(
            "  {}: {} at {} then {} at {} ({} apart)",
            flag.user_id,
            flag.older_location,
            format_timestamp(&flag.older_at),
            flag.newer_location,
            format_timestamp(&flag.newer_at),
            duration_human(flag.gap)
        );
    }
}

/// Persist the outcome: the review CSV and the optional flag export.
///
/// Both outputs are rendered and their directories created before anything
/// is written. If the flag export then fails, the review file is removed
/// again so a failed run leaves no output behind.
pub fn emit(
    outcome: &DetectionOutcome,
    output: &str,
    flagged_output: Option<&str>,
    ctx: &RunContext,
) -> Result<()> {
    log_flags(outcome);

    let mut review = Vec::new();
    write_events(&mut review, &outcome.retained).map_err(|e| AuditError::sink(output, e))?;
    let flag_export = match flagged_output {
        Some(path) => Some((
            path,
            render_flags_json(&outcome.flags, ctx).map_err(|e| AuditError::sink(path, e))?,
        )),
        None => None,
    };

    create_parent_dir(output)?;
    if let Some((path, _)) = &flag_export {
        create_parent_dir(path)?;
    }

    write_output(output, &review)?;
    log::info!(
        "Wrote {} events for review to {}",
        format_number(outcome.retained.len()),
        output
    );

    if let Some((path, contents)) = &flag_export {
        if let Err(err) = write_output(path, contents) {
            if let Err(cleanup) = fs::remove_file(output) {
                log::warn!("Could not remove {} after failed run: {}", output, cleanup);
            }
            return Err(err);
        }
        log::info!("Wrote flag details to {}", path);
    }

    if outcome.truncated {
        log::warn!("Results are incomplete: pagination stopped at the page limit");
    }
    log::info!(
        "Run took {:.3} minutes to execute.",
        ctx.elapsed_minutes()
    );
    Ok(())
}
