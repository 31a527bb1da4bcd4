// =============================================================================
// error.rs — EVERYTHING THAT CAN GO WRONG ON THE WAY TO A JOB LISTING
// =============================================================================
//
// None of these ever escape an adapter. They exist so the pagination loop
// can tell "try that page again" apart from "this source is done for today".
// =============================================================================

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::SourceKind;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Timeouts, refused connections, truncated bodies. Worth another try.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered, but not with a success status.
    #[error("HTTP {status}")]
    Status { status: StatusCode },

    /// The body was not the JSON we were promised.
    #[error("invalid JSON ({reason}); body starts with: {excerpt}")]
    Decode { reason: String, excerpt: String },

    /// A single listing could not be turned into a record.
    #[error("malformed listing: {0}")]
    MalformedItem(String),

    /// The adapter cannot run at all with the current configuration.
    #[error("{source_kind} unavailable: {reason}")]
    Unavailable { source_kind: SourceKind, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl ScrapeError {
    /// Whether the pagination loop should retry the same page.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScrapeError::Transport(_))
    }

    pub(crate) fn decode(reason: impl ToString, body: &str) -> Self {
        ScrapeError::Decode {
            reason: reason.to_string(),
            excerpt: body.chars().take(200).collect(),
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ScrapeError::Status { status },
            None => ScrapeError::Transport(err.to_string()),
        }
    }
}
