// =============================================================================
// config.rs — THE CONTROL PANEL
// =============================================================================
//
// Every magic number the scrapers used to hardcode lives here now: page
// sizes, courtesy delays, timeouts, how many consecutive failures we put
// up with before giving up on a source.
//
// Two layers:
//   * `Config` is process-wide plumbing, read from JOB_HARVEST_* env vars
//     (with a .env file if one is lying around).
//   * `SearchSettings` is what the person running the harvest asked for:
//     where, which country, how many results. It comes off the command line.
//
// Nothing here is global. Both structs are built once in main and handed to
// whoever needs them.
// =============================================================================

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {value}")]
    InvalidUrl { key: &'static str, value: String },

    #[error("'{0}' is not a supported country (try names like 'india', 'usa', 'united kingdom')")]
    UnsupportedCountry(String),

    #[error("no search keywords left after cleanup")]
    NoKeywords,
}

/// Tunables for one paginated REST source.
#[derive(Debug, Clone)]
pub struct PagedSourceConfig {
    pub base_url: String,
    pub page_size: u32,
    pub request_timeout: Duration,
    /// Sleep between successful pages.
    pub page_delay: Duration,
}

/// Failure policy shared by every paginated source.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive transient failures before a source gives up.
    pub max_consecutive_failures: u32,
    /// Base back-off; doubles with each consecutive failure.
    pub retry_backoff: Duration,
}

impl RetryPolicy {
    /// Back-off before retry number `failures` (1-based).
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(6);
        self.retry_backoff.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Width of the scrape worker pool.
    pub max_workers: usize,

    /// Browser-like User-Agent sent by every session.
    pub user_agent: String,

    pub instahyre: PagedSourceConfig,
    /// Instahyre is filtered by job function, not keyword. 9 is "Software / IT".
    pub instahyre_job_function_id: u32,

    pub unstop: PagedSourceConfig,
    /// Unstop returns relative `seo_url`s; this is what they hang off.
    pub unstop_job_url_prefix: String,

    pub retry: RetryPolicy,

    /// JobSpy-compatible search endpoint. Without it the aggregator is skipped.
    pub board_search_url: Option<String>,
    pub board_sites: Vec<String>,
    pub board_search_timeout: Duration,

    pub output_dir: PathBuf,
    /// Saved files older than this many days are deleted before each save.
    pub retention_days: u32,

    /// Each run writes `run_{timestamp}.log` here at DEBUG.
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::build(|_| None)
    }
}

impl Config {
    /// Load configuration from the environment, after pulling in `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup. Unparseable numbers fall
    /// back to their defaults; malformed URLs are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::build(lookup);
        config.validate()?;
        Ok(config)
    }

    fn build<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let num = |key: &str, default: u64| get(key, &default.to_string()).trim().parse().unwrap_or(default);
        let millis = |key: &str, default: u64| Duration::from_millis(num(key, default));
        let secs = |key: &str, default: u64| Duration::from_secs(num(key, default));

        let board_search_url = lookup("JOB_HARVEST_BOARD_SEARCH_URL")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());

        let board_sites = get("JOB_HARVEST_BOARD_SITES", "indeed,linkedin,google,naukri")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            max_workers: (num("JOB_HARVEST_MAX_WORKERS", 12) as usize).max(1),
            user_agent: get("JOB_HARVEST_USER_AGENT", DEFAULT_USER_AGENT),
            instahyre: PagedSourceConfig {
                base_url: get("JOB_HARVEST_INSTAHYRE_URL", "https://www.instahyre.com/api/v1/job_search"),
                page_size: num("JOB_HARVEST_INSTAHYRE_PAGE_SIZE", 20) as u32,
                request_timeout: secs("JOB_HARVEST_INSTAHYRE_TIMEOUT_SECS", 30),
                page_delay: millis("JOB_HARVEST_INSTAHYRE_PAGE_DELAY_MS", 2000),
            },
            instahyre_job_function_id: num("JOB_HARVEST_INSTAHYRE_JOB_FUNCTION", 9) as u32,
            unstop: PagedSourceConfig {
                base_url: get("JOB_HARVEST_UNSTOP_URL", "https://unstop.com/api/public/opportunity/search-result"),
                page_size: num("JOB_HARVEST_UNSTOP_PAGE_SIZE", 20) as u32,
                request_timeout: secs("JOB_HARVEST_UNSTOP_TIMEOUT_SECS", 20),
                page_delay: millis("JOB_HARVEST_UNSTOP_PAGE_DELAY_MS", 500),
            },
            unstop_job_url_prefix: get("JOB_HARVEST_UNSTOP_JOB_URL_PREFIX", "https://unstop.com"),
            retry: RetryPolicy {
                max_consecutive_failures: (num("JOB_HARVEST_MAX_CONSECUTIVE_FAILURES", 3) as u32).max(1),
                retry_backoff: millis("JOB_HARVEST_RETRY_BACKOFF_MS", 1000),
            },
            board_search_url,
            board_sites,
            board_search_timeout: secs("JOB_HARVEST_BOARD_SEARCH_TIMEOUT_SECS", 120),
            output_dir: PathBuf::from(get("JOB_HARVEST_OUTPUT_DIR", "scraped_data")),
            retention_days: num("JOB_HARVEST_RETENTION_DAYS", 7) as u32,
            log_dir: PathBuf::from(get("JOB_HARVEST_LOG_DIR", "logs")),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_url("JOB_HARVEST_INSTAHYRE_URL", &self.instahyre.base_url)?;
        check_url("JOB_HARVEST_UNSTOP_URL", &self.unstop.base_url)?;
        check_url("JOB_HARVEST_UNSTOP_JOB_URL_PREFIX", &self.unstop_job_url_prefix)?;
        if let Some(url) = &self.board_search_url {
            check_url("JOB_HARVEST_BOARD_SEARCH_URL", url)?;
        }
        Ok(())
    }
}

fn check_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidUrl { key, value: value.to_string() })
}

// =============================================================================
// Search settings
// =============================================================================

/// Countries the multi-board search accepts for its Indeed/Naukri country filter.
pub const SUPPORTED_COUNTRIES: &[&str] = &[
    "argentina", "australia", "austria", "bahrain", "belgium", "bulgaria", "brazil",
    "canada", "chile", "china", "colombia", "costa rica", "croatia", "cyprus",
    "czech republic", "czechia", "denmark", "ecuador", "egypt", "estonia", "finland",
    "france", "germany", "greece", "hong kong", "hungary", "india", "indonesia",
    "ireland", "israel", "italy", "japan", "kuwait", "latvia", "lithuania", "luxembourg",
    "malaysia", "malta", "mexico", "morocco", "netherlands", "new zealand", "nigeria",
    "norway", "oman", "pakistan", "panama", "peru", "philippines", "poland", "portugal",
    "qatar", "romania", "saudi arabia", "singapore", "slovakia", "slovenia",
    "south africa", "south korea", "spain", "sweden", "switzerland", "taiwan",
    "thailand", "türkiye", "turkey", "ukraine", "united arab emirates", "uk",
    "united kingdom", "usa", "us", "united states", "uruguay", "venezuela", "vietnam",
];

/// What one harvest run searches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub location: String,
    /// Lower-cased, validated against `SUPPORTED_COUNTRIES`.
    pub country: String,
    pub results_per_site: u32,
    /// Page cap for the paginated sources; 0 means uncapped.
    pub pages_for_others: u32,
}

impl SearchSettings {
    pub fn new(
        location: impl Into<String>,
        country: &str,
        results_per_site: u32,
        pages_for_others: u32,
    ) -> Result<Self, ConfigError> {
        let country = country.trim().to_lowercase();
        let country = if country.is_empty() { "india".to_string() } else { country };
        if !SUPPORTED_COUNTRIES.contains(&country.as_str()) {
            return Err(ConfigError::UnsupportedCountry(country));
        }
        Ok(Self {
            location: location.into().trim().to_string(),
            country,
            results_per_site,
            pages_for_others,
        })
    }

    /// The page cap as the adapters want it.
    pub fn max_pages(&self) -> Option<u32> {
        (self.pages_for_others > 0).then_some(self.pages_for_others)
    }
}

/// Turn raw keyword arguments into the final search list: comma lists are
/// split, whitespace trimmed, blanks dropped, repeats removed (first wins).
pub fn finalize_keywords<I, S>(raw: I) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keywords: Vec<String> = Vec::new();
    for chunk in raw {
        for keyword in chunk.as_ref().split(',').map(str::trim).filter(|k| !k.is_empty()) {
            if !keywords.iter().any(|existing| existing == keyword) {
                keywords.push(keyword.to_string());
            }
        }
    }
    if keywords.is_empty() {
        return Err(ConfigError::NoKeywords);
    }
    Ok(keywords)
}
