//! Fan-out of one fetch cycle across every stored search field.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{CycleError, UpstreamError};
use crate::fetch::backoff::ExponentialBackoff;
use crate::fetch::budget::RequestBudget;
use crate::fetch::cursor::FetchCursor;
use crate::fetch::mapper;
use crate::fetch::pager::Pager;
use crate::store::{Database, TweetSink};
use crate::twitter::auth::BearerSource;
use crate::twitter::client::SearchClient;
use crate::twitter::types::{RawEnvelope, SearchSpec};

const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Tunables of a cycle.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Search fields paged concurrently
    pub concurrency: usize,
    /// Upper bound on search requests per cycle
    pub request_budget: u32,
    /// Retries of a transiently failing page
    pub page_retries: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_budget: 150,
            page_retries: 2,
        }
    }
}

/// Counters of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Search fields loaded
    pub specs: usize,
    /// Search fields whose fetch failed and was excluded
    pub failed_specs: usize,
    /// Search fields that ran out of requests and continue next cycle
    pub deferred_specs: usize,
    /// Envelopes merged from successful fetches
    pub fetched: usize,
    /// Envelopes dropped by the mapper
    pub malformed: usize,
    /// New tweet rows
    pub written: usize,
    /// Tweets already stored
    pub skipped: usize,
}

/// Fans a cycle out over every search field.
///
/// Each search field may spend an equal share of the cycle's request
/// budget. One that runs out before reaching its `since_id` keeps what it
/// fetched and continues below its oldest tweet on the next cycle, so a
/// backlog larger than one budget drains over several cycles.
pub struct Coordinator {
    db: Arc<Database>,
    sink: Arc<dyn TweetSink>,
    client: Arc<dyn SearchClient>,
    credentials: Arc<dyn BearerSource>,
    settings: FetchSettings,
    /// Unfinished windows by author
    backlog: Mutex<HashMap<String, FetchCursor>>,
}

impl Coordinator {
    pub fn new(
        db: Arc<Database>,
        sink: Arc<dyn TweetSink>,
        client: Arc<dyn SearchClient>,
        credentials: Arc<dyn BearerSource>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            db,
            sink,
            client,
            credentials,
            settings,
            backlog: Mutex::default(),
        }
    }

    /// Run one cycle: fetch every search field, wait for all of them, then
    /// write the merged batch in a single transaction.
    ///
    /// A failing search field is logged and excluded; only credential and
    /// storage failures fail the cycle. When `cancel` fires, nothing is
    /// written and [`CycleError::Cancelled`] is returned.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, CycleError> {
        let specs = self.db.list_specs()?;
        let mut report = CycleReport {
            specs: specs.len(),
            ..Default::default()
        };

        if specs.is_empty() {
            log::info!("📭 No search fields stored, nothing to fetch");
            return Ok(report);
        }

        let token = self.credentials.acquire().await?;
        let requests = self.initial_budget(&token).await;
        let budget = Arc::new(RequestBudget::new(requests));
        let allowance = (requests as usize / specs.len()).max(1);
        let backlog = self.pending_windows(&specs);

        log::info!("🚀 Fetch cycle starting");
        log::info!("   ├─ Search fields: {}", specs.len());
        log::info!("   ├─ Resuming: {}", backlog.len());
        log::info!("   ├─ Concurrency: {}", self.settings.concurrency);
        log::info!("   └─ Request budget: {} ({} per search field)", requests, allowance);

        let pager = Arc::new(Pager::new(
            self.client.clone(),
            self.credentials.clone(),
            budget.clone(),
            cancel.clone(),
            ExponentialBackoff::new(RETRY_INITIAL_DELAY, RETRY_MAX_DELAY, self.settings.page_retries),
        ));
        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for spec in specs {
            let cursor = match backlog.get(&spec.author) {
                Some(cursor) => cursor.clone(),
                None => FetchCursor::new(self.db.latest_tweet_id(&spec.author)?),
            };
            let pager = pager.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => pager.fetch(&spec, cursor, allowance).await,
                    Err(_) => Err(UpstreamError::Cancelled),
                };
                (spec, outcome)
            });
        }

        let mut envelopes: Vec<RawEnvelope> = Vec::new();
        let mut windows: Vec<(String, Option<FetchCursor>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((spec, Ok(fetched))) => {
                    log::info!(
                        "   ├─ ✅ @{} (search field {}): {} tweets",
                        spec.author,
                        spec.id,
                        fetched.envelopes.len()
                    );
                    if fetched.deferred {
                        report.deferred_specs += 1;
                    }
                    envelopes.extend(fetched.envelopes);
                    windows.push((spec.author, fetched.resume));
                }
                Ok((spec, Err(e))) => {
                    report.failed_specs += 1;
                    log::warn!("   ├─ ❌ @{} (search field {}): {}", spec.author, spec.id, e);
                }
                Err(e) => {
                    report.failed_specs += 1;
                    log::error!("   ├─ ❌ Fetch task aborted: {}", e);
                }
            }
        }

        if cancel.is_cancelled() {
            log::warn!("🛑 Fetch cycle cancelled, discarding {} unwritten tweets", envelopes.len());
            return Err(CycleError::Cancelled);
        }

        report.fetched = envelopes.len();
        let (records, malformed) = mapper::map_all(&envelopes);
        report.malformed = malformed;

        if !records.is_empty() {
            let summary = self.sink.write_all(&records).await?;
            report.written = summary.written;
            report.skipped = summary.skipped;
        }
        self.record_windows(windows);

        log::info!(
            "✅ Fetch cycle complete: {} written, {} skipped, {} malformed, {}/{} search fields failed, {} deferred, {} requests left",
            report.written,
            report.skipped,
            report.malformed,
            report.failed_specs,
            report.specs,
            report.deferred_specs,
            budget.remaining()
        );
        Ok(report)
    }

    /// Unfinished windows of the current search fields. Windows of authors no
    /// longer searched are dropped.
    fn pending_windows(&self, specs: &[SearchSpec]) -> HashMap<String, FetchCursor> {
        let mut backlog = self.backlog.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        backlog.retain(|author, _| specs.iter().any(|spec| &spec.author == author));
        backlog.clone()
    }

    /// Applied only once the batch is stored, so a failed or cancelled cycle
    /// resumes from the same windows.
    fn record_windows(&self, windows: Vec<(String, Option<FetchCursor>)>) {
        let mut backlog = self.backlog.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (author, resume) in windows {
            match resume {
                Some(cursor) => {
                    backlog.insert(author, cursor);
                }
                None => {
                    backlog.remove(&author);
                }
            }
        }
    }

    async fn initial_budget(&self, token: &str) -> u32 {
        let configured = self.settings.request_budget;
        match self.client.search_quota(token).await {
            Ok(Some(remaining)) => remaining.min(configured),
            Ok(None) => configured,
            Err(e) => {
                log::warn!("⚠️  Rate limit status unavailable ({}), using budget {}", e, configured);
                configured
            }
        }
    }
}
