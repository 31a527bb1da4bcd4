// ═══════════════════════════════════════════════════════════════
// RUN METRICS - How did each source do this time?
// ═══════════════════════════════════════════════════════════════
//
// Atomic counters, one set per source, bumped from inside the worker
// tasks without any locking. At the end of a run main takes a snapshot
// and logs it as JSON. There is no server: a harvest is a batch job.

use portable_atomic::{AtomicU64, Ordering};
use serde::Serialize;
use std::time::Instant;

use crate::dedup::DedupReport;
use crate::models::SourceKind;

/// Per-source counters.
#[derive(Default)]
struct SourceCounters {
    tasks: AtomicU64,
    tasks_failed: AtomicU64,
    records: AtomicU64,
    pages_fetched: AtomicU64,
    page_errors: AtomicU64,
    items_skipped: AtomicU64,
}

impl SourceCounters {
    fn snapshot(&self, source: SourceKind) -> SourceSnapshot {
        SourceSnapshot {
            source: source.to_string(),
            tasks: self.tasks.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            page_errors: self.page_errors.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub source: String,
    pub tasks: u64,
    pub tasks_failed: u64,
    pub records: u64,
    pub pages_fetched: u64,
    pub page_errors: u64,
    pub items_skipped: u64,
}

/// What gets logged at the end of a run.
#[derive(Debug, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub sources: Vec<SourceSnapshot>,
    pub records_collected: u64,
    pub records_kept: u64,
    pub duplicates_dropped: u64,
    pub unkeyed_records: u64,
    pub elapsed_seconds: f64,
}

pub struct RunMetrics {
    aggregator: SourceCounters,
    instahyre: SourceCounters,
    unstop: SourceCounters,
    records_kept: AtomicU64,
    duplicates_dropped: AtomicU64,
    unkeyed_records: AtomicU64,
    start_time: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            aggregator: SourceCounters::default(),
            instahyre: SourceCounters::default(),
            unstop: SourceCounters::default(),
            records_kept: AtomicU64::new(0),
            duplicates_dropped: AtomicU64::new(0),
            unkeyed_records: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    fn counters(&self, source: SourceKind) -> &SourceCounters {
        match source {
            SourceKind::Aggregator => &self.aggregator,
            SourceKind::Instahyre => &self.instahyre,
            SourceKind::Unstop => &self.unstop,
        }
    }

    pub fn increment_tasks(&self, source: SourceKind) {
        self.counters(source).tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_task_failures(&self, source: SourceKind) {
        self.counters(source).tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records(&self, source: SourceKind, count: usize) {
        self.counters(source).records.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn increment_pages(&self, source: SourceKind) {
        self.counters(source).pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_page_errors(&self, source: SourceKind) {
        self.counters(source).page_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_skipped_items(&self, source: SourceKind) {
        self.counters(source).items_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup(&self, report: &DedupReport) {
        self.records_kept.fetch_add(report.kept as u64, Ordering::Relaxed);
        self.duplicates_dropped.fetch_add(report.duplicates_dropped as u64, Ordering::Relaxed);
        self.unkeyed_records.fetch_add(report.unkeyed as u64, Ordering::Relaxed);
    }

    pub fn source_snapshot(&self, source: SourceKind) -> SourceSnapshot {
        self.counters(source).snapshot(source)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let sources: Vec<SourceSnapshot> =
            SourceKind::ALL.iter().map(|&s| self.source_snapshot(s)).collect();
        MetricsSnapshot {
            records_collected: sources.iter().map(|s| s.records).sum(),
            sources,
            records_kept: self.records_kept.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            unkeyed_records: self.unkeyed_records.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}
