//! Live detection against the Duo Admin API.
//!
//! Pulls the authentication log for the lookback window, runs the pipeline
//! and writes the review file.
//!
//! # Usage
//!
//! ```bash
//! # Credentials from the environment
//! export DUO_IKEY=DIXXXXXXXXXXXXXXXXXX DUO_HOST=api-xxxxxxxx.duosecurity.com
//! export DUO_SKEY_FILE=/run/secrets/duo_skey
//! travel-audit detect --days-to-go-back 1 --hours-to-compare 2
//!
//! # Also export the flags as JSON
//! travel-audit detect --output review.csv --flagged-output flags.json
//! ```
//!
//! # Requirements
//!
//! An Admin API integration with the "Grant read log" permission.

use crate::config::DetectionConfig;
use crate::detection::{self, AuthLogSource, DetectionOutcome, RunContext};
use crate::duo_api::DuoClient;
use crate::error::AuditError;
use crate::report;
use crate::utils::time::LookbackWindow;
use anyhow::Result;

/// Duo integration credentials as given on the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct Credentials<'a> {
    pub ikey: Option<&'a str>,
    pub skey: Option<&'a str>,
    pub host: Option<&'a str>,
}

pub async fn run(
    credentials: Credentials<'_>,
    config: &DetectionConfig,
    output: &str,
    flagged_output: Option<&str>,
    show_progress: bool,
) -> Result<DetectionOutcome> {
    let ctx = RunContext::new(show_progress);
    config.validate()?;

    let mut client = DuoClient::from_options(credentials.ikey, credentials.skey, credentials.host)
        .map_err(|e| AuditError::Setup(format!("{:#}", e)))?;
    log::info!("Successfully imported API credentials for {}.", client.host());

    let window = LookbackWindow::ending_now(config.days_to_go_back)
        .map_err(|e| AuditError::Config(format!("{:#}", e)))?;
    execute(&mut client, &window, config, output, flagged_output, &ctx).await
}

/// Run the pipeline against any log source and emit the results.
///
/// `config` must already be validated; [`run`] does that before any
/// credentials are resolved.
pub async fn execute<S>(
    source: &mut S,
    window: &LookbackWindow,
    config: &DetectionConfig,
    output: &str,
    flagged_output: Option<&str>,
    ctx: &RunContext,
) -> Result<DetectionOutcome>
where
    S: AuthLogSource + ?Sized,
{
    let outcome = detection::run(source, window, config, ctx).await?;
    report::emit(&outcome, output, flagged_output, ctx)?;
    Ok(outcome)
}
