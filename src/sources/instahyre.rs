// =============================================================================
// sources/instahyre.rs — INSTAHYRE JOB SEARCH
// =============================================================================
//
// Instahyre does not do keyword search on its public API. It filters by
// job function (a small integer; 9 is Software / IT) and pages with
// `limit` + `offset`. One task per run is enough.
//
// Response shape:
//
//   { "objects": [ { "id": 1234, "title": "...", "employer": {...},
//                    "public_url": "...", "locations": "...",
//                    "keywords": ["Rust", "Kafka"] }, ... ] }
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use serde_json::Value;

use super::pagination::{build_session, get_json, listings_at, paginate, PageCursor, PagedApi, PaginationPolicy};
use super::JobSource;
use crate::config::{Config, PagedSourceConfig};
use crate::error::ScrapeError;
use crate::metrics::RunMetrics;
use crate::models::{
    id_to_string, or_default, InstahyreListing, JobRecord, SourceKind, NOT_AVAILABLE, NOT_DISCLOSED,
    NO_COMPANY_NAME, NO_DESCRIPTION,
};

pub struct InstahyreSource {
    client: reqwest::Client,
    settings: PagedSourceConfig,
    job_function_id: u32,
    policy: PaginationPolicy,
    metrics: Arc<RunMetrics>,
}

impl InstahyreSource {
    pub fn new(
        config: &Config,
        job_function_id: u32,
        max_pages: Option<u32>,
        metrics: Arc<RunMetrics>,
    ) -> Result<Self, ScrapeError> {
        if job_function_id == 0 {
            return Err(ScrapeError::Unavailable {
                source_kind: SourceKind::Instahyre,
                reason: "no job function id configured".into(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = build_session(&config.user_agent, config.instahyre.request_timeout, headers)?;

        Ok(Self {
            client,
            settings: config.instahyre.clone(),
            job_function_id,
            policy: PaginationPolicy {
                max_pages,
                page_delay: config.instahyre.page_delay,
                retry: config.retry.clone(),
            },
            metrics,
        })
    }

    fn query(&self, cursor: &PageCursor) -> Vec<(&'static str, String)> {
        vec![
            ("company_size", "0".into()),
            ("isLandingPage", "true".into()),
            ("job_type", "0".into()),
            ("limit", self.settings.page_size.to_string()),
            ("job_functions", self.job_function_id.to_string()),
            ("offset", cursor.offset.to_string()),
        ]
    }
}

#[async_trait]
impl PagedApi for InstahyreSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Instahyre
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Value, ScrapeError> {
        get_json(&self.client, &self.settings.base_url, &self.query(cursor)).await
    }

    fn listings<'a>(&self, body: &'a Value) -> &'a [Value] {
        listings_at(body, "/objects")
    }

    fn transform(&self, raw: &Value) -> Result<JobRecord, ScrapeError> {
        transform_listing(raw)
    }
}

#[async_trait]
impl JobSource for InstahyreSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Instahyre
    }

    async fn scrape(&self) -> Vec<JobRecord> {
        paginate(self, &self.policy, &self.metrics).await
    }
}

/// One Instahyre listing -> one `JobRecord`.
pub fn transform_listing(raw: &Value) -> Result<JobRecord, ScrapeError> {
    let listing = InstahyreListing::deserialize(raw).map_err(|e| ScrapeError::MalformedItem(e.to_string()))?;

    let employer = listing.employer.as_ref();
    let company_name = or_default(employer.and_then(|e| e.company_name.as_deref()), NO_COMPANY_NAME);
    let description = or_default(employer.and_then(|e| e.instahyre_note.as_deref()), NO_DESCRIPTION);

    Ok(JobRecord {
        source_platform: SourceKind::Instahyre.to_string(),
        job_id: id_to_string(listing.id.as_ref()),
        job_title: or_default(listing.title.as_deref(), "No Title"),
        company_name,
        job_url: or_default(listing.public_url.as_deref(), NOT_AVAILABLE),
        location: render_locations(listing.locations.as_ref()),
        date_posted: NOT_AVAILABLE.to_string(),
        experience_required: NOT_DISCLOSED.to_string(),
        salary_range: NOT_DISCLOSED.to_string(),
        skills: render_keywords(listing.keywords.as_deref()),
        description,
    })
}

/// `locations` is usually "Bangalore, Pune" but sometimes a list.
fn render_locations(locations: Option<&Value>) -> String {
    match locations {
        Some(Value::String(s)) => or_default(Some(s.as_str()), NOT_DISCLOSED),
        Some(Value::Array(items)) => {
            let names: Vec<&str> = items.iter().filter_map(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).collect();
            if names.is_empty() {
                NOT_DISCLOSED.to_string()
            } else {
                names.join(", ")
            }
        }
        _ => NOT_DISCLOSED.to_string(),
    }
}

fn render_keywords(keywords: Option<&[Value]>) -> String {
    let skills: Vec<String> = keywords
        .unwrap_or_default()
        .iter()
        .filter_map(|k| match k {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();
    if skills.is_empty() {
        NOT_DISCLOSED.to_string()
    } else {
        skills.join(", ")
    }
}
