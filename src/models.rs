// =============================================================================
// models.rs — THE ONE SCHEMA TO RULE THEM ALL
// =============================================================================
//
// Three sources, three wildly different ideas of what a "job" looks like.
// One of them nests the company under `employer`, one hides it under
// `organisation` (and sometimes sends `null` instead), and the aggregator
// hands back flat rows with half the columns missing.
//
// Everything funnels into `JobRecord`. Every field is a String and every
// field is always populated: when a source has nothing to say we write a
// sentinel ("N/A", "Not Disclosed", ...) instead of leaving a hole.
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Sentinel for "the source gave us nothing usable". Also the identity
/// key value that opts a record out of de-duplication.
pub const NOT_AVAILABLE: &str = "N/A";

/// Sentinel for data the source deliberately withholds (salary, skills...).
pub const NOT_DISCLOSED: &str = "Not Disclosed";

pub const NO_COMPANY_NAME: &str = "No Company Name";
pub const NO_DESCRIPTION: &str = "No description provided.";

/// Which adapter produced a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// The multi-board search service (Indeed, LinkedIn, Google, Naukri).
    Aggregator,
    /// Instahyre's job-function filtered search API.
    Instahyre,
    /// Unstop's keyword search API.
    Unstop,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Aggregator, SourceKind::Instahyre, SourceKind::Unstop];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Aggregator => write!(f, "JobSpy"),
            SourceKind::Instahyre => write!(f, "Instahyre.com"),
            SourceKind::Unstop => write!(f, "Unstop.com"),
        }
    }
}

/// The canonical job record. Built once inside an adapter's transform
/// step and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub source_platform: String,
    /// Source-native identifier. Opaque, may be "N/A".
    pub job_id: String,
    pub job_title: String,
    pub company_name: String,
    /// Identity key for de-duplication.
    pub job_url: String,
    pub location: String,
    pub date_posted: String,
    pub experience_required: String,
    pub salary_range: String,
    pub skills: String,
    pub description: String,
}

impl JobRecord {
    /// The de-duplication key, or `None` when the record has no reliable
    /// identity (blank or the "N/A" sentinel). Compared verbatim.
    pub fn identity_key(&self) -> Option<&str> {
        if self.job_url.trim().is_empty() || self.job_url == NOT_AVAILABLE {
            None
        } else {
            Some(&self.job_url)
        }
    }

    /// Projects the record into the fixed output column order. `job_id`
    /// is internal and is not part of the output.
    pub fn to_row(&self) -> ListingRow {
        ListingRow {
            source_platform: self.source_platform.clone(),
            job_title: self.job_title.clone(),
            company_name: self.company_name.clone(),
            location: self.location.clone(),
            date_posted: self.date_posted.clone(),
            experience_required: self.experience_required.clone(),
            salary_range: self.salary_range.clone(),
            skills: self.skills.clone(),
            description: self.description.clone(),
            job_url: self.job_url.clone(),
        }
    }
}

/// One output row. Field order here is the column order of the saved file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub source_platform: String,
    pub job_title: String,
    pub company_name: String,
    pub location: String,
    pub date_posted: String,
    pub experience_required: String,
    pub salary_range: String,
    pub skills: String,
    pub description: String,
    pub job_url: String,
}

// =============================================================================
// Raw source shapes
// =============================================================================
// Everything is optional. Numbers that sometimes arrive as strings stay as
// `Value` and get coerced by the adapter that owns them.
// =============================================================================

/// One row from the multi-board search service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardRow {
    pub site: Option<String>,
    pub job_url_id: Option<Value>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub job_url: Option<String>,
    pub location: Option<String>,
    pub date_posted: Option<String>,
    pub description: Option<String>,
    pub skills: Option<String>,
    pub job_type: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub currency: Option<String>,
}

/// The board search service answers either `{"jobs": [...]}` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BoardSearchResponse {
    Wrapped { jobs: Vec<BoardRow> },
    Bare(Vec<BoardRow>),
}

impl BoardSearchResponse {
    pub fn into_rows(self) -> Vec<BoardRow> {
        match self {
            BoardSearchResponse::Wrapped { jobs } => jobs,
            BoardSearchResponse::Bare(rows) => rows,
        }
    }
}

/// A listing from Instahyre's `objects` array.
#[derive(Debug, Clone, Deserialize)]
pub struct InstahyreListing {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub employer: Option<InstahyreEmployer>,
    pub public_url: Option<String>,
    /// Usually a display string, occasionally a list of city names.
    pub locations: Option<Value>,
    #[serde(default)]
    pub keywords: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstahyreEmployer {
    pub company_name: Option<String>,
    pub instahyre_note: Option<String>,
}

/// A listing from Unstop's `data.data` array.
#[derive(Debug, Clone, Deserialize)]
pub struct UnstopListing {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub seo_url: Option<String>,
    pub approved_date: Option<String>,
    /// `null` is common here and means the same as missing.
    pub organisation: Option<UnstopOrganisation>,
    /// Same story: `null` and absent are both "no detail".
    #[serde(rename = "jobDetail")]
    pub job_detail: Option<UnstopJobDetail>,
    #[serde(default)]
    pub filters: Option<Vec<UnstopFilter>>,
    #[serde(default)]
    pub seo_details: Option<Vec<UnstopSeoDetail>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnstopOrganisation {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnstopJobDetail {
    #[serde(default)]
    pub locations: Option<Vec<Option<String>>>,
    pub min_salary: Option<Value>,
    pub max_salary: Option<Value>,
    /// Usually a bool, sometimes 0/1 or a string. Coerced by the adapter.
    pub not_disclosed: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnstopFilter {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnstopSeoDetail {
    pub description: Option<String>,
}

/// Render an opaque JSON identifier the way a human would write it:
/// strings unquoted, numbers as-is, anything else as "N/A".
pub fn id_to_string(id: Option<&Value>) -> String {
    match id {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Returns the trimmed string, or `default` when it is missing or blank.
pub fn or_default(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
