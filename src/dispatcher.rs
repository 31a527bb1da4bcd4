// =============================================================================
// dispatcher.rs — FAN OUT, GATHER IN
// =============================================================================
//
// Plans the run (one aggregator task and one Unstop task per keyword, plus
// a single Instahyre task) and executes it on a bounded pool:
//
//   * every task is its own tokio task, so one adapter hanging on a slow
//     page never holds up the others
//   * a semaphore keeps at most `max_workers` of them scraping at once
//   * results are gathered as tasks finish, not in submission order
//
// A task that dies anyway (the runtime reports a JoinError) is logged by
// name and simply contributes nothing.
// =============================================================================

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::SearchSettings;
use crate::metrics::RunMetrics;
use crate::models::JobRecord;
use crate::runner::{run_task, ScrapeTask, SourceFactory};
use crate::sources::aggregator::BoardQuery;

/// The full task list for one run.
pub fn plan_tasks(
    keywords: &[String],
    settings: &SearchSettings,
    board_sites: &[String],
    job_function_id: u32,
) -> Vec<ScrapeTask> {
    let mut tasks = Vec::with_capacity(keywords.len() * 2 + 1);

    for keyword in keywords {
        tasks.push(ScrapeTask::Aggregator { query: BoardQuery::new(board_sites, keyword, settings) });
    }
    tasks.push(ScrapeTask::FunctionFiltered { job_function_id, max_pages: settings.max_pages() });
    for keyword in keywords {
        tasks.push(ScrapeTask::KeywordSearch { keyword: keyword.clone(), max_pages: settings.max_pages() });
    }

    tasks
}

pub struct Dispatcher {
    factory: Arc<dyn SourceFactory>,
    metrics: Arc<RunMetrics>,
    max_workers: usize,
}

impl Dispatcher {
    pub fn new(factory: Arc<dyn SourceFactory>, metrics: Arc<RunMetrics>, max_workers: usize) -> Self {
        Self { factory, metrics, max_workers: max_workers.max(1) }
    }

    /// Run every task and concatenate their output in completion order.
    pub async fn dispatch(&self, tasks: Vec<ScrapeTask>) -> Vec<JobRecord> {
        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut pending = FuturesUnordered::new();

        for task in tasks {
            let label = task.to_string();
            let factory = Arc::clone(&self.factory);
            let metrics = Arc::clone(&self.metrics);
            let permits = Arc::clone(&permits);

            let handle = tokio::spawn(async move {
                // Only fails on a closed semaphore.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Vec::new();
                };
                run_task(factory.as_ref(), &task, &metrics).await
            });

            pending.push(async move { (label, handle.await) });
        }

        info!(tasks = pending.len(), workers = self.max_workers, "Submitted scraping tasks");

        let mut collected = Vec::new();
        while let Some((label, joined)) = pending.next().await {
            match joined {
                Ok(records) => {
                    debug!(task = %label, count = records.len(), "Task completed");
                    collected.extend(records);
                }
                Err(err) => error!(task = %label, error = %err, "Task ended abnormally"),
            }
        }

        info!(total = collected.len(), "All scrapers finished");
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use crate::runner::tests::{Behaviour, FakeFactory};

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    fn settings() -> SearchSettings {
        SearchSettings::new("Bengaluru", "india", 25, 5).unwrap()
    }

    #[test]
    fn test_plan_has_two_tasks_per_keyword_plus_one() {
        let tasks = plan_tasks(&keywords(&["Data Scientist", "ML Engineer"]), &settings(), &[], 9);
        assert_eq!(tasks.len(), 5);
        let count = |kind: SourceKind| tasks.iter().filter(|t| t.kind() == kind).count();
        assert_eq!(count(SourceKind::Aggregator), 2);
        assert_eq!(count(SourceKind::Unstop), 2);
        assert_eq!(count(SourceKind::Instahyre), 1);
        assert!(tasks.contains(&ScrapeTask::FunctionFiltered { job_function_id: 9, max_pages: Some(5) }));
    }

    #[tokio::test]
    async fn test_all_sources_contribute() {
        let factory = Arc::new(FakeFactory {
            aggregator: Behaviour::Yield(3),
            instahyre: Behaviour::Yield(5),
            unstop: Behaviour::Yield(2),
        });
        let metrics = Arc::new(RunMetrics::new());
        let dispatcher = Dispatcher::new(factory, Arc::clone(&metrics), 2);
        let tasks = plan_tasks(&keywords(&["a", "b"]), &settings(), &[], 9);
        let records = dispatcher.dispatch(tasks).await;
        // 2 aggregator * 3 + 1 instahyre * 5 + 2 unstop * 2
        assert_eq!(records.len(), 15);
        assert_eq!(metrics.snapshot().records_collected, 15);
    }

    #[tokio::test]
    async fn test_panicking_source_does_not_sink_the_run() {
        let factory = Arc::new(FakeFactory {
            aggregator: Behaviour::Yield(3),
            instahyre: Behaviour::Panic,
            unstop: Behaviour::RefuseToBuild,
        });
        let metrics = Arc::new(RunMetrics::new());
        let dispatcher = Dispatcher::new(factory, Arc::clone(&metrics), 4);
        let records = dispatcher.dispatch(plan_tasks(&keywords(&["a"]), &settings(), &[], 9)).await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.source_platform == "JobSpy"));
        assert_eq!(metrics.source_snapshot(SourceKind::Instahyre).tasks_failed, 1);
        assert_eq!(metrics.source_snapshot(SourceKind::Unstop).tasks_failed, 1);
    }

    #[tokio::test]
    async fn test_no_tasks_means_no_records() {
        let factory = Arc::new(FakeFactory {
            aggregator: Behaviour::Yield(1),
            instahyre: Behaviour::Yield(1),
            unstop: Behaviour::Yield(1),
        });
        let dispatcher = Dispatcher::new(factory, Arc::new(RunMetrics::new()), 1);
        assert!(dispatcher.dispatch(Vec::new()).await.is_empty());
    }
}
