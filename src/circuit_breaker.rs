// =============================================================================
// circuit_breaker.rs — THE "THREE STRIKES" RULE
// =============================================================================
//
// Job APIs flake. A timeout on page 4 does not mean the source is dead, so
// the pagination loop gets to try that page again. But it should not try
// forever: after N consecutive transient failures the breaker opens and
// the adapter goes home with whatever it already collected.
//
// One breaker per scrape run. There is no half-open state and no cooldown:
// a scrape run is short-lived, and once a source has failed N times in a
// row within a run we have nothing to gain by waiting it out.
// =============================================================================

use parking_lot::Mutex;
use tracing::{info, warn};

/// Closed: requests flow. Open: the run is over for this source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CircuitState {
    Closed,
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
        }
    }
}

struct CircuitBreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    total_failures: u64,
}

/// Consecutive-failure breaker. `&self` everywhere so it can sit inside an
/// adapter that is only ever borrowed.
pub struct CircuitBreaker {
    /// Used in log lines so we know which source tripped.
    name: String,
    inner: Mutex<CircuitBreakerInner>,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(CircuitBreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                total_failures: 0,
            }),
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// `false` once the breaker has opened.
    pub fn allow_request(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// A page came back fine: the failure streak is over.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.consecutive_failures > 0 {
            info!(
                name = %self.name,
                after_failures = inner.consecutive_failures,
                "Source recovered, failure streak reset"
            );
        }
        inner.consecutive_failures = 0;
    }

    /// Count a failure. Returns the length of the current streak.
    pub fn record_failure(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        inner.total_failures += 1;

        if inner.state == CircuitState::Closed && inner.consecutive_failures >= self.failure_threshold {
            warn!(
                name = %self.name,
                failures = inner.consecutive_failures,
                "Circuit breaker TRIPPED — no more requests this run"
            );
            inner.state = CircuitState::Open;
        }
        inner.consecutive_failures
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_failures: inner.total_failures,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
}
