//! Paginated retrieval of raw authentication log records.

use super::RunContext;
use crate::authlog::types::{AuthLogPage, ContinuationToken, LogQuery};
use crate::error::{AuditError, Result};
use crate::utils::format::format_number;
use async_trait::async_trait;
use serde_json::Value;

/// Anything that can serve one page of the authentication log.
#[async_trait]
pub trait AuthLogSource: Send {
    /// Fetch the page after `token`, or the first page when `token` is `None`.
    async fn fetch_page(
        &mut self,
        query: &LogQuery,
        token: Option<&ContinuationToken>,
    ) -> anyhow::Result<AuthLogPage>;
}

/// Raw records accumulated over every page.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<Value>,
    pub pages: usize,
    /// The page cap stopped pagination while the API still had a token.
    pub truncated: bool,
}

/// Page through `source` until the continuation token runs out.
///
/// At most `max_pages` requests are made. Any fetch error aborts and the
/// records gathered so far are dropped with it.
pub async fn fetch_all<S>(
    source: &mut S,
    query: &LogQuery,
    max_pages: usize,
    ctx: &RunContext,
) -> Result<FetchOutcome>
where
    S: AuthLogSource + ?Sized,
{
    let mut outcome = FetchOutcome::default();
    let mut token: Option<ContinuationToken> = None;
    let progress = ctx.page_progress();

    while outcome.pages < max_pages {
        let page_number = outcome.pages + 1;
        let page = source
            .fetch_page(query, token.as_ref())
            .await
            .map_err(|err| AuditError::fetch(page_number, err))?;

        outcome.pages = page_number;
        outcome.records.extend(page.events);
        progress.page_done(outcome.records.len());
        log::debug!(
            "page {}: {} records so far",
            page_number,
            outcome.records.len()
        );

        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => {
                progress.finish_with_message(&format!(
                    "Fetched authentication logs in {} page(s)",
                    progress.pages()
                ));
                log::info!(
                    "Fetched {} authentication events over {} page(s)",
                    format_number(outcome.records.len()),
                    outcome.pages
                );
                return Ok(outcome);
            }
        }
    }

    progress.finish_with_message(&format!("Stopped at page limit ({})", progress.pages()));
    log::warn!(
        "Stopped after {} pages with more data still available; results cover {} events",
        max_pages,
        format_number(outcome.records.len())
    );
    outcome.truncated = true;
    Ok(outcome)
}
