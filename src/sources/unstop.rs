// =============================================================================
// sources/unstop.rs — UNSTOP KEYWORD SEARCH
// =============================================================================
//
// Unstop's public search endpoint takes a keyword, pages with `page` +
// `per_page`, and nests the listings two levels deep:
//
//   { "data": { "data": [ {...}, {...} ] } }
//
// The listings themselves are the messiest of the three sources. Salaries
// hide behind a `not_disclosed` flag, the experience band is a "filter"
// tag, job URLs are relative, and `jobDetail` / `organisation` show up as
// `null` often enough that we treat null and missing identically.
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use super::pagination::{build_session, get_json, listings_at, paginate, PageCursor, PagedApi, PaginationPolicy};
use super::{group_thousands, JobSource};
use crate::config::{Config, PagedSourceConfig};
use crate::error::ScrapeError;
use crate::metrics::RunMetrics;
use crate::models::{
    id_to_string, or_default, JobRecord, SourceKind, UnstopJobDetail, UnstopListing, NOT_AVAILABLE,
    NOT_DISCLOSED, NO_COMPANY_NAME, NO_DESCRIPTION,
};

pub struct UnstopSource {
    client: reqwest::Client,
    settings: PagedSourceConfig,
    keyword: String,
    job_url_prefix: Url,
    policy: PaginationPolicy,
    metrics: Arc<RunMetrics>,
}

impl UnstopSource {
    pub fn new(
        config: &Config,
        keyword: &str,
        max_pages: Option<u32>,
        metrics: Arc<RunMetrics>,
    ) -> Result<Self, ScrapeError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ScrapeError::Unavailable {
                source_kind: SourceKind::Unstop,
                reason: "empty search keyword".into(),
            });
        }

        let job_url_prefix = Url::parse(&config.unstop_job_url_prefix).map_err(|e| ScrapeError::Unavailable {
            source_kind: SourceKind::Unstop,
            reason: format!("bad job URL prefix: {e}"),
        })?;

        let referer = format!("{}/jobs", config.unstop_job_url_prefix.trim_end_matches('/'));
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(&referer).map_err(|e| ScrapeError::Client(e.to_string()))?,
        );
        let client = build_session(&config.user_agent, config.unstop.request_timeout, headers)?;

        Ok(Self {
            client,
            settings: config.unstop.clone(),
            keyword: keyword.to_string(),
            job_url_prefix,
            policy: PaginationPolicy {
                max_pages,
                page_delay: config.unstop.page_delay,
                retry: config.retry.clone(),
            },
            metrics,
        })
    }

    fn query(&self, cursor: &PageCursor) -> Vec<(&'static str, String)> {
        vec![
            ("opportunity", "jobs".into()),
            ("page", cursor.page_num.to_string()),
            ("per_page", self.settings.page_size.to_string()),
            ("oppstatus", "recent".into()),
            ("searchTerm", self.keyword.clone()),
        ]
    }
}

#[async_trait]
impl PagedApi for UnstopSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Unstop
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Value, ScrapeError> {
        get_json(&self.client, &self.settings.base_url, &self.query(cursor)).await
    }

    fn listings<'a>(&self, body: &'a Value) -> &'a [Value] {
        listings_at(body, "/data/data")
    }

    fn transform(&self, raw: &Value) -> Result<JobRecord, ScrapeError> {
        transform_listing(raw, &self.job_url_prefix)
    }
}

#[async_trait]
impl JobSource for UnstopSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Unstop
    }

    async fn scrape(&self) -> Vec<JobRecord> {
        paginate(self, &self.policy, &self.metrics).await
    }
}

/// One Unstop listing -> one `JobRecord`. Relative `seo_url`s are resolved
/// against `prefix`.
pub fn transform_listing(raw: &Value, prefix: &Url) -> Result<JobRecord, ScrapeError> {
    let listing = UnstopListing::deserialize(raw).map_err(|e| ScrapeError::MalformedItem(e.to_string()))?;
    let job_id = id_to_string(listing.id.as_ref());
    let detail = listing.job_detail.clone().unwrap_or_default();

    let job_url = match listing.seo_url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(path) => prefix
            .join(path)
            .map_err(|e| ScrapeError::MalformedItem(format!("bad seo_url '{path}': {e}")))?
            .to_string(),
        None => NOT_AVAILABLE.to_string(),
    };

    let location = join_non_blank(detail.locations.iter().flatten().flatten().map(String::as_str));
    let experience_required =
        join_non_blank(listing.filters.iter().flatten().filter_map(|f| f.name.as_deref()));

    let description = listing
        .seo_details
        .as_ref()
        .and_then(|details| details.first())
        .and_then(|d| d.description.as_deref());

    let date_posted = match listing.approved_date.as_deref() {
        None => NOT_DISCLOSED.to_string(),
        Some(raw_date) => parse_posted_date(raw_date).unwrap_or_else(|| {
            warn!(job_id = %job_id, approved_date = raw_date, "Could not parse posting date");
            NOT_DISCLOSED.to_string()
        }),
    };

    Ok(JobRecord {
        source_platform: SourceKind::Unstop.to_string(),
        job_title: or_default(listing.title.as_deref(), "No Title Provided"),
        company_name: or_default(
            listing.organisation.as_ref().and_then(|o| o.name.as_deref()),
            NO_COMPANY_NAME,
        ),
        job_url,
        location,
        date_posted,
        experience_required,
        salary_range: render_salary(&detail),
        skills: NOT_DISCLOSED.to_string(),
        description: or_default(description, NO_DESCRIPTION),
        job_id,
    })
}

fn join_non_blank<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let parts: Vec<&str> = parts.map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        NOT_DISCLOSED.to_string()
    } else {
        parts.join(", ")
    }
}

/// "₹600,000 - ₹900,000" when the employer disclosed a salary, otherwise
/// "Not Disclosed". A missing maximum is rendered as 0.
fn render_salary(detail: &UnstopJobDetail) -> String {
    let disclosed = !detail.not_disclosed.as_ref().map_or(true, is_truthy);
    let min = detail.min_salary.as_ref().and_then(as_amount);
    match (disclosed, min) {
        (true, Some(min)) => {
            let max = detail.max_salary.as_ref().and_then(as_amount).unwrap_or(0);
            format!("₹{} - ₹{}", group_thousands(min), group_thousands(max))
        }
        _ => NOT_DISCLOSED.to_string(),
    }
}

/// Truthiness of a loosely typed flag: `false`, `0`, `""`, `null` and empty
/// collections are false, everything else is true.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Whole rupees from a number or numeric string. Fractions are truncated.
fn as_amount(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n.as_i64().map(i128::from).or_else(|| n.as_f64().map(|f| f.trunc() as i128)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i128),
        _ => None,
    }
}

/// ISO-8601-ish timestamp -> `YYYY-MM-DD`.
fn parse_posted_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive().format("%Y-%m-%d").to_string());
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Some(ts.date_naive().format("%Y-%m-%d").to_string());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.date().format("%Y-%m-%d").to_string());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prefix() -> Url {
        Url::parse("https://unstop.com").unwrap()
    }

    #[test]
    fn test_full_listing() {
        let raw = json!({
            "id": 991,
            "title": "Data Analyst",
            "seo_url": "/jobs/data-analyst-acme-991",
            "approved_date": "2024-05-01T10:15:00+05:30",
            "organisation": {"name": "Acme"},
            "jobDetail": {
                "locations": ["Mumbai", null, "Pune"],
                "min_salary": 600000,
                "max_salary": 900000.75,
                "not_disclosed": false
            },
            "filters": [{"name": "0-2 years"}, {"name": "Full Time"}],
            "seo_details": [{"description": "  Crunch numbers.  "}]
        });
        let record = transform_listing(&raw, &prefix()).unwrap();
        assert_eq!(record.job_url, "https://unstop.com/jobs/data-analyst-acme-991");
        assert_eq!(record.location, "Mumbai, Pune");
        assert_eq!(record.experience_required, "0-2 years, Full Time");
        assert_eq!(record.salary_range, "₹600,000 - ₹900,000");
        assert_eq!(record.date_posted, "2024-05-01");
        assert_eq!(record.description, "Crunch numbers.");
        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.skills, "Not Disclosed");
    }

    #[test]
    fn test_null_job_detail_yields_not_disclosed() {
        let raw = json!({"id": 5, "title": "SDE", "jobDetail": null, "organisation": null});
        let record = transform_listing(&raw, &prefix()).unwrap();
        assert_eq!(record.location, "Not Disclosed");
        assert_eq!(record.salary_range, "Not Disclosed");
        assert_eq!(record.company_name, "No Company Name");
        assert_eq!(record.job_url, "N/A");
    }

    #[test]
    fn test_salary_hidden_unless_explicitly_disclosed() {
        let detail = UnstopJobDetail { min_salary: Some(json!(500000)), ..Default::default() };
        assert_eq!(render_salary(&detail), "Not Disclosed");

        let detail = UnstopJobDetail {
            min_salary: Some(json!("350000")),
            not_disclosed: Some(json!(false)),
            ..Default::default()
        };
        assert_eq!(render_salary(&detail), "₹350,000 - ₹0");

        let detail = UnstopJobDetail { not_disclosed: Some(json!(false)), ..Default::default() };
        assert_eq!(render_salary(&detail), "Not Disclosed");
    }

    #[test]
    fn test_loosely_typed_disclosure_flag() {
        let salary = |flag: Value| {
            let raw = json!({
                "id": 3,
                "jobDetail": {"min_salary": 400000, "max_salary": 500000, "not_disclosed": flag}
            });
            transform_listing(&raw, &prefix()).unwrap().salary_range
        };
        assert_eq!(salary(json!(0)), "₹400,000 - ₹500,000");
        assert_eq!(salary(json!(1)), "Not Disclosed");
        assert_eq!(salary(json!("false")), "Not Disclosed");
        assert_eq!(salary(json!("")), "₹400,000 - ₹500,000");
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_posted_date("2024-03-09T08:00:00Z").as_deref(), Some("2024-03-09"));
        assert_eq!(parse_posted_date("2024-03-09T08:00:00.123456").as_deref(), Some("2024-03-09"));
        assert_eq!(parse_posted_date("2024-03-09 08:00:00").as_deref(), Some("2024-03-09"));
        assert_eq!(parse_posted_date("2024-03-09").as_deref(), Some("2024-03-09"));
        assert_eq!(parse_posted_date("last tuesday"), None);
    }

    #[test]
    fn test_unparseable_date_is_not_fatal() {
        let record = transform_listing(&json!({"id": 1, "approved_date": "soon"}), &prefix()).unwrap();
        assert_eq!(record.date_posted, "Not Disclosed");
    }

    #[test]
    fn test_query_uses_page_number_and_keyword() {
        let source = UnstopSource::new(&Config::default(), " Rust Developer ", None, Arc::new(RunMetrics::new())).unwrap();
        let query = source.query(&PageCursor { page_num: 4, offset: 60 });
        assert!(query.contains(&("page", "4".to_string())));
        assert!(query.contains(&("searchTerm", "Rust Developer".to_string())));
        assert!(query.contains(&("oppstatus", "recent".to_string())));
    }

    #[test]
    fn test_blank_keyword_is_unavailable() {
        let result = UnstopSource::new(&Config::default(), "  ", None, Arc::new(RunMetrics::new()));
        assert!(matches!(result, Err(ScrapeError::Unavailable { source_kind: SourceKind::Unstop, .. })));
    }
}
