// =============================================================================
// sources/aggregator.rs — FOUR JOB BOARDS, ONE REQUEST
// =============================================================================
//
// Indeed, LinkedIn, Google Jobs and Naukri are not scraped by us directly.
// A JobSpy-compatible search service does that, and we POST it one query
// per keyword:
//
//   POST {JOB_HARVEST_BOARD_SEARCH_URL}
//   { "site_name": ["indeed", ...], "search_term": "...", "location": "...",
//     "results_wanted": 25, "country_indeed": "india",
//     "google_search_term": "<keyword> jobs in <location>" }
//
// It answers with flat rows (see `BoardRow`). No pagination, no retries:
// the service already does both. If it fails, this keyword gets nothing
// from the aggregator and the run carries on.
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use super::{group_thousands, JobSource};
use crate::config::{Config, SearchSettings};
use crate::error::ScrapeError;
use crate::models::{
    id_to_string, or_default, BoardRow, BoardSearchResponse, JobRecord, SourceKind, NOT_AVAILABLE,
    NOT_DISCLOSED, NO_COMPANY_NAME, NO_DESCRIPTION,
};

/// The query sent to the board search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardQuery {
    pub site_name: Vec<String>,
    pub search_term: String,
    pub location: String,
    pub results_wanted: u32,
    pub country_indeed: String,
    pub google_search_term: String,
}

impl BoardQuery {
    pub fn new(sites: &[String], keyword: &str, settings: &SearchSettings) -> Self {
        Self {
            site_name: sites.to_vec(),
            search_term: keyword.to_string(),
            location: settings.location.clone(),
            results_wanted: settings.results_per_site,
            country_indeed: settings.country.clone(),
            google_search_term: format!("{keyword} jobs in {}", settings.location),
        }
    }
}

/// Anything that can run a multi-board search.
#[async_trait]
pub trait BoardSearch: Send + Sync {
    async fn search(&self, query: &BoardQuery) -> anyhow::Result<Vec<BoardRow>>;
}

/// `BoardSearch` over HTTP.
pub struct HttpBoardSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBoardSearch {
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let endpoint = config.board_search_url.clone().ok_or_else(|| ScrapeError::Unavailable {
            source_kind: SourceKind::Aggregator,
            reason: "JOB_HARVEST_BOARD_SEARCH_URL is not set".into(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.board_search_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ScrapeError::Client(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl BoardSearch for HttpBoardSearch {
    async fn search(&self, query: &BoardQuery) -> anyhow::Result<Vec<BoardRow>> {
        let response: BoardSearchResponse = self
            .client
            .post(&self.endpoint)
            .json(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.into_rows())
    }
}

pub struct AggregatorSource {
    search: Arc<dyn BoardSearch>,
    query: BoardQuery,
}

impl AggregatorSource {
    pub fn new(search: Arc<dyn BoardSearch>, query: BoardQuery) -> Self {
        Self { search, query }
    }
}

#[async_trait]
impl JobSource for AggregatorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Aggregator
    }

    async fn scrape(&self) -> Vec<JobRecord> {
        info!(
            keyword = %self.query.search_term,
            location = %self.query.location,
            sites = ?self.query.site_name,
            "Searching job boards"
        );

        match self.search.search(&self.query).await {
            Ok(rows) if rows.is_empty() => {
                warn!(keyword = %self.query.search_term, "Board search returned no jobs");
                Vec::new()
            }
            Ok(rows) => {
                let records: Vec<JobRecord> = rows.iter().map(transform_row).collect();
                info!(keyword = %self.query.search_term, count = records.len(), "Board search finished");
                records
            }
            Err(err) => {
                error!(keyword = %self.query.search_term, error = %err, "Board search failed");
                Vec::new()
            }
        }
    }
}

/// One aggregator row -> one `JobRecord`.
pub fn transform_row(row: &BoardRow) -> JobRecord {
    JobRecord {
        source_platform: or_default(row.site.as_deref(), "JobSpy"),
        job_id: id_to_string(row.job_url_id.as_ref()),
        job_title: or_default(row.title.as_deref(), "No Title Provided"),
        company_name: or_default(row.company.as_deref(), NO_COMPANY_NAME),
        job_url: or_default(row.job_url.as_deref(), NOT_AVAILABLE),
        location: or_default(row.location.as_deref(), NOT_DISCLOSED),
        date_posted: or_default(row.date_posted.as_deref(), NOT_AVAILABLE),
        experience_required: or_default(row.job_type.as_deref(), NOT_DISCLOSED),
        salary_range: render_salary(row.min_amount, row.max_amount, row.currency.as_deref()),
        skills: or_default(row.skills.as_deref(), NOT_DISCLOSED),
        description: or_default(row.description.as_deref(), NO_DESCRIPTION),
    }
}

/// "50,000 - 80,000 INR", "50,000 INR" or "Not Disclosed".
fn render_salary(min: Option<f64>, max: Option<f64>, currency: Option<&str>) -> String {
    let currency = currency.map(str::trim).unwrap_or_default();
    let min = min.filter(|v| v.is_finite());
    let max = max.filter(|v| v.is_finite());
    let rendered = match (min, max) {
        (Some(min), Some(max)) => format!("{} - {} {currency}", whole(min), whole(max)),
        (Some(min), None) => format!("{} {currency}", whole(min)),
        _ => return NOT_DISCLOSED.to_string(),
    };
    rendered.trim().to_string()
}

fn whole(amount: f64) -> String {
    group_thousands(amount.round_ties_even() as i128)
}
