// =============================================================================
// sources/mod.rs — WHERE THE JOBS COME FROM
// =============================================================================
//
// Three adapters, one contract:
//
//   * aggregator — one call to a multi-board search service that covers
//     Indeed, LinkedIn, Google and Naukri in a single request.
//   * instahyre  — paginated REST API filtered by job function.
//   * unstop     — paginated REST API searched by keyword.
//
// Every adapter implements `JobSource`. `scrape()` does all the network
// work and hands back finished `JobRecord`s. It has no error channel on
// purpose: a source that breaks halfway returns what it has, a source that
// never gets going returns an empty list, and the log says why.
//
// The two REST adapters share their pagination loop (see `pagination`).
// =============================================================================

pub mod aggregator;
pub mod instahyre;
pub mod pagination;
pub mod unstop;

use async_trait::async_trait;

use crate::models::{JobRecord, SourceKind};

#[async_trait]
pub trait JobSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch and transform everything this source has for its parameters.
    /// Ordinary failures degrade to a shorter (possibly empty) list.
    async fn scrape(&self) -> Vec<JobRecord>;
}

/// `1234567` -> `"1,234,567"`.
pub(crate) fn group_thousands(value: i128) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
