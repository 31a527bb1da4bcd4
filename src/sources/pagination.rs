// =============================================================================
// sources/pagination.rs — THE PAGE TURNER
// =============================================================================
//
// Both REST sources page through results the same way, so the loop lives
// here once:
//
//   1. stop when the page cap is passed
//   2. stop when the circuit breaker is open (too many failures in a row)
//   3. GET the page
//   4. HTTP error status  -> log, stop
//   5. invalid JSON       -> log, stop
//      transport failure  -> log, back off, retry the same page
//   6. success            -> reset the failure streak, pull the listings
//                            out of the body, stop if there are none,
//                            transform each one (skipping the broken ones),
//                            advance, sleep a little, go again
//
// Whatever made it into `records` before the loop ended is the result.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RetryPolicy;
use crate::error::ScrapeError;
use crate::metrics::RunMetrics;
use crate::models::{id_to_string, JobRecord, SourceKind};

/// Where we are in the result set. Both counters move on every page; each
/// source sends whichever one its API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// 1-based page number.
    pub page_num: u32,
    /// Number of listings received so far.
    pub offset: usize,
}

impl PageCursor {
    pub fn first() -> Self {
        Self { page_num: 1, offset: 0 }
    }

    fn advance(&mut self, fetched: usize) {
        self.page_num += 1;
        self.offset += fetched;
    }
}

#[derive(Debug, Clone)]
pub struct PaginationPolicy {
    /// `None` means keep going until the source runs dry.
    pub max_pages: Option<u32>,
    /// Courtesy pause between successful pages.
    pub page_delay: Duration,
    pub retry: RetryPolicy,
}

impl PaginationPolicy {
    fn cap_reached(&self, cursor: &PageCursor) -> bool {
        self.max_pages.is_some_and(|max| cursor.page_num > max)
    }
}

/// The per-source half of the loop: how to fetch a page, where the
/// listings live in the body, how to turn one listing into a record.
#[async_trait]
pub trait PagedApi: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Value, ScrapeError>;

    fn listings<'a>(&self, body: &'a Value) -> &'a [Value];

    fn transform(&self, raw: &Value) -> Result<JobRecord, ScrapeError>;
}

/// Array at `pointer` inside `body`, or an empty slice.
pub fn listings_at<'a>(body: &'a Value, pointer: &str) -> &'a [Value] {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Run the pagination loop to completion. Never fails: the worst case is
/// an empty list.
pub async fn paginate(api: &dyn PagedApi, policy: &PaginationPolicy, metrics: &RunMetrics) -> Vec<JobRecord> {
    let kind = api.kind();
    let breaker = CircuitBreaker::new(kind.to_string(), policy.retry.max_consecutive_failures);
    let mut cursor = PageCursor::first();
    let mut records: Vec<JobRecord> = Vec::new();

    info!(source = %kind, max_pages = ?policy.max_pages, "Starting paginated scrape");

    loop {
        if policy.cap_reached(&cursor) {
            info!(source = %kind, max_pages = ?policy.max_pages, "Reached page limit");
            break;
        }
        if !breaker.allow_request() {
            let snapshot = breaker.snapshot();
            error!(
                source = %kind,
                page = cursor.page_num,
                breaker = %snapshot.state,
                failures = snapshot.consecutive_failures,
                "Exceeded max consecutive failures — ending scrape"
            );
            break;
        }

        debug!(source = %kind, page = cursor.page_num, offset = cursor.offset, "Requesting page");

        let body = match api.fetch_page(&cursor).await {
            Ok(body) => {
                breaker.record_success();
                body
            }
            Err(err) if err.is_transient() => {
                metrics.increment_page_errors(kind);
                let failures = breaker.record_failure();
                if breaker.allow_request() {
                    let backoff = policy.retry.backoff_for(failures);
                    warn!(
                        source = %kind,
                        page = cursor.page_num,
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transient failure — retrying page"
                    );
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }
            Err(err) => {
                metrics.increment_page_errors(kind);
                error!(source = %kind, page = cursor.page_num, error = %err, "Page request failed — aborting scrape");
                break;
            }
        };

        metrics.increment_pages(kind);

        let listings = api.listings(&body);
        if listings.is_empty() {
            info!(source = %kind, page = cursor.page_num, "No more jobs found — scrape complete");
            break;
        }

        let fetched = listings.len();
        for raw in listings {
            match api.transform(raw) {
                Ok(record) => records.push(record),
                Err(err) => {
                    metrics.increment_skipped_items(kind);
                    warn!(
                        source = %kind,
                        job_id = %id_to_string(raw.get("id")),
                        error = %err,
                        "Could not transform listing — skipping"
                    );
                }
            }
        }

        info!(source = %kind, page = cursor.page_num, fetched, total = records.len(), "Fetched page");
        cursor.advance(fetched);

        if !policy.page_delay.is_zero() && !policy.cap_reached(&cursor) {
            tokio::time::sleep(policy.page_delay).await;
        }
    }

    info!(source = %kind, total = records.len(), pages = cursor.page_num - 1, "Scrape finished");
    records
}

// =============================================================================
// HTTP plumbing shared by the REST adapters
// =============================================================================

/// A session with a browser-like User-Agent plus any source-specific headers.
pub fn build_session(user_agent: &str, timeout: Duration, mut headers: HeaderMap) -> Result<reqwest::Client, ScrapeError> {
    let agent = HeaderValue::from_str(user_agent).map_err(|e| ScrapeError::Client(e.to_string()))?;
    headers.insert(USER_AGENT, agent);
    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ScrapeError::Client(e.to_string()))
}

/// GET `url` with `query` and parse the body as JSON, sorting failures
/// into transport / status / decode.
pub async fn get_json(client: &reqwest::Client, url: &str, query: &[(&str, String)]) -> Result<Value, ScrapeError> {
    let response = client.get(url).query(query).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status { status });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ScrapeError::decode(e, &body))
}
