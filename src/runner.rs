// =============================================================================
// runner.rs — ONE TASK, ONE ADAPTER, NO ESCAPES
// =============================================================================
//
// A `ScrapeTask` says what to search ("Unstop for 'Data Analyst', 5 pages").
// The runner turns it into a live adapter via a `SourceFactory`, lets it
// scrape, and guarantees that whatever happens the caller gets a list back:
//
//   build fails     -> logged, empty list
//   scrape panics   -> logged, empty list
//   scrape returns  -> whatever it returned
//
// The dispatcher never has to think about how an adapter can break.
// =============================================================================

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, warn, Instrument};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::metrics::RunMetrics;
use crate::models::{JobRecord, SourceKind};
use crate::sources::aggregator::{AggregatorSource, BoardQuery, BoardSearch, HttpBoardSearch};
use crate::sources::instahyre::InstahyreSource;
use crate::sources::unstop::UnstopSource;
use crate::sources::JobSource;

/// One unit of scrape work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeTask {
    /// Multi-board search for one keyword.
    Aggregator { query: BoardQuery },
    /// Instahyre, filtered by job function.
    FunctionFiltered { job_function_id: u32, max_pages: Option<u32> },
    /// Unstop, searched by keyword.
    KeywordSearch { keyword: String, max_pages: Option<u32> },
}

impl ScrapeTask {
    pub fn kind(&self) -> SourceKind {
        match self {
            ScrapeTask::Aggregator { .. } => SourceKind::Aggregator,
            ScrapeTask::FunctionFiltered { .. } => SourceKind::Instahyre,
            ScrapeTask::KeywordSearch { .. } => SourceKind::Unstop,
        }
    }
}

impl fmt::Display for ScrapeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeTask::Aggregator { query } => write!(f, "{}['{}']", self.kind(), query.search_term),
            ScrapeTask::FunctionFiltered { job_function_id, .. } => {
                write!(f, "{}[function {}]", self.kind(), job_function_id)
            }
            ScrapeTask::KeywordSearch { keyword, .. } => write!(f, "{}['{}']", self.kind(), keyword),
        }
    }
}

/// Turns a task into a ready-to-run adapter.
pub trait SourceFactory: Send + Sync {
    fn build(&self, task: &ScrapeTask) -> Result<Box<dyn JobSource>, ScrapeError>;
}

/// The factory used in production: real HTTP adapters.
pub struct LiveSourceFactory {
    config: Arc<Config>,
    board: Option<Arc<dyn BoardSearch>>,
    metrics: Arc<RunMetrics>,
}

impl LiveSourceFactory {
    pub fn new(config: Arc<Config>, metrics: Arc<RunMetrics>) -> Self {
        let board: Option<Arc<dyn BoardSearch>> = match HttpBoardSearch::new(&config) {
            Ok(search) => Some(Arc::new(search)),
            Err(err) => {
                warn!(error = %err, "Multi-board search disabled for this run");
                None
            }
        };
        Self { config, board, metrics }
    }
}

impl SourceFactory for LiveSourceFactory {
    fn build(&self, task: &ScrapeTask) -> Result<Box<dyn JobSource>, ScrapeError> {
        match task {
            ScrapeTask::Aggregator { query } => {
                let board = self.board.clone().ok_or_else(|| ScrapeError::Unavailable {
                    source_kind: SourceKind::Aggregator,
                    reason: "no board search endpoint configured".into(),
                })?;
                Ok(Box::new(AggregatorSource::new(board, query.clone())))
            }
            ScrapeTask::FunctionFiltered { job_function_id, max_pages } => Ok(Box::new(InstahyreSource::new(
                &self.config,
                *job_function_id,
                *max_pages,
                Arc::clone(&self.metrics),
            )?)),
            ScrapeTask::KeywordSearch { keyword, max_pages } => Ok(Box::new(UnstopSource::new(
                &self.config,
                keyword,
                *max_pages,
                Arc::clone(&self.metrics),
            )?)),
        }
    }
}

/// Build and run one task. Never fails and never panics outward.
pub async fn run_task(factory: &dyn SourceFactory, task: &ScrapeTask, metrics: &RunMetrics) -> Vec<JobRecord> {
    let kind = task.kind();
    let span = tracing::info_span!("scrape", source = %kind, task = %task);
    metrics.increment_tasks(kind);

    async move {
        let built = std::panic::catch_unwind(AssertUnwindSafe(|| factory.build(task)));
        let source = match built {
            Ok(Ok(source)) => source,
            Ok(Err(err)) => {
                metrics.increment_task_failures(kind);
                error!(error = %err, "Could not start scraper");
                return Vec::new();
            }
            Err(payload) => {
                metrics.increment_task_failures(kind);
                error!(panic = %panic_message(payload.as_ref()), "Scraper panicked during setup");
                return Vec::new();
            }
        };

        match AssertUnwindSafe(source.scrape()).catch_unwind().await {
            Ok(records) => {
                info!(count = records.len(), "Scraper finished");
                metrics.add_records(source.kind(), records.len());
                records
            }
            Err(payload) => {
                metrics.increment_task_failures(kind);
                error!(panic = %panic_message(payload.as_ref()), "Scraper panicked — discarding its results");
                Vec::new()
            }
        }
    }
    .instrument(span)
    .await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::models::{NOT_AVAILABLE, NOT_DISCLOSED};

    pub(crate) fn record(kind: SourceKind, url: &str) -> JobRecord {
        JobRecord {
            source_platform: kind.to_string(),
            job_id: NOT_AVAILABLE.into(),
            job_title: "Engineer".into(),
            company_name: "Acme".into(),
            job_url: url.into(),
            location: NOT_DISCLOSED.into(),
            date_posted: NOT_AVAILABLE.into(),
            experience_required: NOT_DISCLOSED.into(),
            salary_range: NOT_DISCLOSED.into(),
            skills: NOT_DISCLOSED.into(),
            description: "x".into(),
        }
    }

    /// How a fake adapter behaves.
    #[derive(Clone, Copy)]
    pub(crate) enum Behaviour {
        Yield(usize),
        Panic,
        RefuseToBuild,
    }

    struct FakeSource {
        kind: SourceKind,
        behaviour: Behaviour,
        tag: String,
    }

    #[async_trait]
    impl JobSource for FakeSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn scrape(&self) -> Vec<JobRecord> {
            match self.behaviour {
                Behaviour::Yield(n) => (0..n).map(|i| record(self.kind, &format!("https://{}/{i}", self.tag))).collect(),
                Behaviour::Panic => panic!("adapter blew up"),
                Behaviour::RefuseToBuild => unreachable!(),
            }
        }
    }

    /// A factory whose adapters behave according to the task's source kind.
    pub(crate) struct FakeFactory {
        pub(crate) aggregator: Behaviour,
        pub(crate) instahyre: Behaviour,
        pub(crate) unstop: Behaviour,
    }

    impl SourceFactory for FakeFactory {
        fn build(&self, task: &ScrapeTask) -> Result<Box<dyn JobSource>, ScrapeError> {
            let behaviour = match task.kind() {
                SourceKind::Aggregator => self.aggregator,
                SourceKind::Instahyre => self.instahyre,
                SourceKind::Unstop => self.unstop,
            };
            if let Behaviour::RefuseToBuild = behaviour {
                return Err(ScrapeError::Unavailable { source_kind: task.kind(), reason: "test".into() });
            }
            Ok(Box::new(FakeSource { kind: task.kind(), behaviour, tag: task.to_string() }))
        }
    }

    fn unstop_task() -> ScrapeTask {
        ScrapeTask::KeywordSearch { keyword: "Rust".into(), max_pages: Some(2) }
    }

    #[tokio::test]
    async fn test_successful_task_returns_records() {
        let factory = FakeFactory { aggregator: Behaviour::Yield(0), instahyre: Behaviour::Yield(0), unstop: Behaviour::Yield(4) };
        let metrics = RunMetrics::new();
        let records = run_task(&factory, &unstop_task(), &metrics).await;
        assert_eq!(records.len(), 4);
        let snapshot = metrics.source_snapshot(SourceKind::Unstop);
        assert_eq!(snapshot.tasks, 1);
        assert_eq!(snapshot.records, 4);
    }

    #[tokio::test]
    async fn test_records_are_credited_to_the_adapter_that_produced_them() {
        struct MislabelledFactory;

        impl SourceFactory for MislabelledFactory {
            fn build(&self, _task: &ScrapeTask) -> Result<Box<dyn JobSource>, ScrapeError> {
                Ok(Box::new(FakeSource { kind: SourceKind::Aggregator, behaviour: Behaviour::Yield(2), tag: "agg".into() }))
            }
        }

        let metrics = RunMetrics::new();
        let records = run_task(&MislabelledFactory, &unstop_task(), &metrics).await;
        assert_eq!(records.len(), 2);
        assert_eq!(metrics.source_snapshot(SourceKind::Unstop).tasks, 1);
        assert_eq!(metrics.source_snapshot(SourceKind::Unstop).records, 0);
        assert_eq!(metrics.source_snapshot(SourceKind::Aggregator).records, 2);
    }

    #[tokio::test]
    async fn test_panicking_adapter_yields_empty() {
        let factory = FakeFactory { aggregator: Behaviour::Yield(0), instahyre: Behaviour::Yield(0), unstop: Behaviour::Panic };
        let metrics = RunMetrics::new();
        let records = run_task(&factory, &unstop_task(), &metrics).await;
        assert!(records.is_empty());
        assert_eq!(metrics.source_snapshot(SourceKind::Unstop).tasks_failed, 1);
    }

    #[tokio::test]
    async fn test_construction_failure_yields_empty() {
        let factory = FakeFactory {
            aggregator: Behaviour::Yield(0),
            instahyre: Behaviour::Yield(0),
            unstop: Behaviour::RefuseToBuild,
        };
        let metrics = RunMetrics::new();
        assert!(run_task(&factory, &unstop_task(), &metrics).await.is_empty());
        assert_eq!(metrics.source_snapshot(SourceKind::Unstop).tasks_failed, 1);
    }

    #[tokio::test]
    async fn test_live_factory_without_board_endpoint_skips_aggregator() {
        let metrics = Arc::new(RunMetrics::new());
        let factory = LiveSourceFactory::new(Arc::new(Config::default()), Arc::clone(&metrics));
        let settings = crate::config::SearchSettings::new("Pune", "india", 10, 1).unwrap();
        let task = ScrapeTask::Aggregator { query: BoardQuery::new(&[], "Rust", &settings) };
        assert!(run_task(&factory, &task, &metrics).await.is_empty());
        assert_eq!(metrics.source_snapshot(SourceKind::Aggregator).tasks_failed, 1);
    }

    #[test]
    fn test_task_labels() {
        assert_eq!(unstop_task().to_string(), "Unstop.com['Rust']");
        let task = ScrapeTask::FunctionFiltered { job_function_id: 9, max_pages: None };
        assert_eq!(task.to_string(), "Instahyre.com[function 9]");
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
