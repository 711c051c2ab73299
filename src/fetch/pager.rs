//! Pages backward through one search field's results.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::UpstreamError;
use crate::fetch::backoff::ExponentialBackoff;
use crate::fetch::budget::RequestBudget;
use crate::fetch::cursor::{Advance, FetchCursor};
use crate::twitter::auth::BearerSource;
use crate::twitter::client::SearchClient;
use crate::twitter::query;
use crate::twitter::types::{PageParams, RawEnvelope, SearchPage, SearchSpec};

/// Result of paging one search field.
#[derive(Debug, Default)]
pub struct SpecFetch {
    pub envelopes: Vec<RawEnvelope>,
    /// Paging stopped before the window was exhausted
    pub deferred: bool,
    /// Where the next cycle continues; `None` when nothing older is pending.
    pub resume: Option<FetchCursor>,
}

impl SpecFetch {
    fn cut_short(spec: &SearchSpec, envelopes: Vec<RawEnvelope>, cursor: FetchCursor) -> Self {
        log::info!(
            "   ├─ ⏸️  @{}: out of requests after {} tweets, resuming below {:?}",
            spec.author,
            envelopes.len(),
            cursor.max_id
        );
        // Without an upper bound the next cycle starts from the stored
        // high-water mark anyway.
        let resume = cursor.max_id.is_some().then_some(cursor);
        Self {
            envelopes,
            deferred: true,
            resume,
        }
    }
}

/// Drives the since_id/max_id loop for a single [`SearchSpec`].
///
/// One `Pager` is shared by every spec of a cycle; all paging state lives in
/// the per-call [`FetchCursor`].
pub struct Pager {
    client: Arc<dyn SearchClient>,
    credentials: Arc<dyn BearerSource>,
    budget: Arc<RequestBudget>,
    cancel: CancellationToken,
    backoff: ExponentialBackoff,
}

impl Pager {
    pub fn new(
        client: Arc<dyn SearchClient>,
        credentials: Arc<dyn BearerSource>,
        budget: Arc<RequestBudget>,
        cancel: CancellationToken,
        backoff: ExponentialBackoff,
    ) -> Self {
        Self {
            client,
            credentials,
            budget,
            cancel,
            backoff,
        }
    }

    /// Fetch every tweet of `cursor`'s window, newest page first.
    ///
    /// At most `allowance` pages are requested. When the allowance or the
    /// cycle budget runs out, the pages fetched so far are kept and
    /// [`SpecFetch::resume`] holds the cursor to continue from. Any other
    /// page failure aborts this spec and discards what was accumulated.
    pub async fn fetch(
        &self,
        spec: &SearchSpec,
        mut cursor: FetchCursor,
        allowance: usize,
    ) -> Result<SpecFetch, UpstreamError> {
        let query = query::build(&spec.search_field.terms());
        if query.is_empty() {
            log::warn!("⚠️  Search field {} builds an empty query, skipping", spec.id);
            return Ok(SpecFetch::default());
        }

        let since_id = cursor.since_id;
        let mut envelopes = Vec::new();
        let mut pages = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Err(UpstreamError::Cancelled);
            }
            if pages >= allowance {
                return Ok(SpecFetch::cut_short(spec, envelopes, cursor));
            }

            let params = cursor.page_params(&query, spec.search_field.count);
            let page = match self.fetch_page(&params).await {
                Ok(page) => page,
                Err(UpstreamError::BudgetExhausted) => {
                    return Ok(SpecFetch::cut_short(spec, envelopes, cursor));
                }
                Err(e) => return Err(e),
            };
            pages += 1;

            if page.statuses.is_empty() {
                break;
            }

            let advance = cursor.advance(page.ids());
            envelopes.extend(page.statuses.into_iter().map(|status| RawEnvelope {
                status,
                params: params.clone(),
            }));

            match advance {
                Advance::Next => {}
                Advance::Exhausted => break,
                Advance::Stalled => {
                    return Err(UpstreamError::Decode(format!(
                        "page did not move max_id below {:?}",
                        cursor.max_id
                    )));
                }
            }
        }

        cursor.reset();
        log::debug!(
            "   ├─ @{}: {} tweets in {} pages (since_id {:?})",
            spec.author,
            envelopes.len(),
            pages,
            since_id
        );
        Ok(SpecFetch {
            envelopes,
            deferred: false,
            resume: None,
        })
    }

    /// One page, with a single token refresh on 401 and backoff on
    /// transient failures. Every attempt draws from the budget.
    async fn fetch_page(&self, params: &PageParams) -> Result<SearchPage, UpstreamError> {
        let mut token = self.credentials.acquire().await?;
        let mut refreshed = false;
        let mut backoff = self.backoff.clone();
        backoff.reset();

        loop {
            if !self.budget.try_take() {
                return Err(UpstreamError::BudgetExhausted);
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(UpstreamError::Cancelled),
                result = self.client.search(&token, params) => result,
            };

            match result {
                Ok(page) => {
                    if let Some(remaining) = page.rate_limit_remaining {
                        self.budget.observe_remaining(remaining);
                    }
                    return Ok(page);
                }
                Err(UpstreamError::Unauthorized) if !refreshed => {
                    log::warn!("🔑 Bearer token rejected, refreshing");
                    refreshed = true;
                    token = self.credentials.refresh(&token).await?;
                }
                Err(e) if e.is_retryable() => {
                    let hint = e.retry_after();
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(UpstreamError::Cancelled),
                        waited = backoff.sleep(hint) => {
                            if waited.is_err() {
                                return Err(e);
                            }
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
