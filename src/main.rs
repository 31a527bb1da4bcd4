//      ██╗ ██████╗ ██████╗
//      ██║██╔═══██╗██╔══██╗
//      ██║██║   ██║██████╔╝
// ██   ██║██║   ██║██╔══██╗
// ╚█████╔╝╚██████╔╝██████╔╝
//  ╚════╝  ╚═════╝ ╚═════╝
//
// H A R V E S T   E N G I N E
//
// Fans out over the job boards, Instahyre and Unstop for every keyword,
// collects whatever comes back, drops the duplicates and writes one tidy
// file per run.

mod circuit_breaker;
mod config;
mod dedup;
mod dispatcher;
mod error;
mod logging;
mod metrics;
mod models;
mod runner;
mod sink;
mod sources;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn, Instrument};

use crate::config::{finalize_keywords, Config, SearchSettings};
use crate::dedup::Deduplicator;
use crate::dispatcher::{plan_tasks, Dispatcher};
use crate::logging::LogFormat;
use crate::metrics::RunMetrics;
use crate::models::ListingRow;
use crate::runner::LiveSourceFactory;
use crate::sink::{save_in_background, JsonFileSink};

/// Scrape job listings from several boards and save one de-duplicated file.
#[derive(Debug, Parser)]
#[command(name = "job_harvest_engine", version, about)]
struct Cli {
    /// Search keyword. Repeat the flag or pass a comma-separated list.
    #[arg(short, long = "keyword", required = true)]
    keywords: Vec<String>,

    /// Where to search, e.g. "Bengaluru".
    #[arg(short, long, default_value = "")]
    location: String,

    /// Country for the Indeed/Naukri filter.
    #[arg(short, long, default_value = "india")]
    country: String,

    /// Results wanted from each aggregated job board.
    #[arg(long, default_value_t = 25)]
    results_per_site: u32,

    /// Page cap for Instahyre and Unstop. 0 means no cap.
    #[arg(long, default_value_t = 5)]
    pages: u32,

    /// Overrides JOB_HARVEST_OUTPUT_DIR.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn print_banner() {
    let banner = r#"
    ╔════════════════════════════════════════════════════════╗
    ║                                                        ║
    ║          J O B   H A R V E S T   E N G I N E           ║
    ║                                                        ║
    ║   Sources:  Indeed | LinkedIn | Google | Naukri        ║
    ║             Instahyre | Unstop                         ║
    ║   Dedup:    exact, by job URL                          ║
    ║   Output:   one JSON file per run                      ║
    ║                                                        ║
    ╚════════════════════════════════════════════════════════╝
    "#;
    println!("{banner}");
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(dir) = cli.output_dir.clone() {
        config.output_dir = dir;
    }
    let config = Arc::new(config);

    // Held until main returns so the run log is flushed.
    let _log_session = logging::init(cli.log_format, &config.log_dir)?;
    if cli.log_format == LogFormat::Pretty {
        print_banner();
    }

    let settings = SearchSettings::new(cli.location.as_str(), &cli.country, cli.results_per_site, cli.pages)?;
    let keywords = finalize_keywords(&cli.keywords)?;

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("harvest", run_id = %run_id);

    tokio::select! {
        result = harvest(config, settings, keywords).instrument(span) => result,
        interrupted = signal::ctrl_c() => {
            if let Err(err) = interrupted {
                error!(error = %err, "Signal listener failed");
            }
            warn!(run_id = %run_id, "🛑 Interrupted — nothing was saved");
            Ok(())
        }
    }
}

async fn harvest(config: Arc<Config>, settings: SearchSettings, keywords: Vec<String>) -> Result<()> {
    info!(
        keywords = ?keywords,
        location = %settings.location,
        country = %settings.country,
        results_per_site = settings.results_per_site,
        pages = settings.pages_for_others,
        workers = config.max_workers,
        "🚀 Starting job harvest"
    );

    let metrics = Arc::new(RunMetrics::new());
    let factory = Arc::new(LiveSourceFactory::new(Arc::clone(&config), Arc::clone(&metrics)));
    let dispatcher = Dispatcher::new(factory, Arc::clone(&metrics), config.max_workers);

    let tasks = plan_tasks(&keywords, &settings, &config.board_sites, config.instahyre_job_function_id);
    let collected = dispatcher.dispatch(tasks).await;

    let (unique, report) = Deduplicator::new().process(collected);
    metrics.record_dedup(&report);

    if unique.is_empty() {
        warn!("No job listings collected — skipping save");
    } else {
        let rows: Vec<ListingRow> = unique.iter().map(|r| r.to_row()).collect();
        let sink = JsonFileSink::new(config.output_dir.clone(), config.retention_days);
        let row_count = rows.len();
        match save_in_background(sink, rows).await {
            Ok(path) => info!(file = %path.display(), rows = row_count, "✅ Harvest saved"),
            Err(err) => error!(error = %err, "❌ Could not save job listings"),
        }
    }

    let snapshot = metrics.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => info!(metrics = %json, "📊 Run summary"),
        Err(err) => warn!(error = %err, "Could not serialize run summary"),
    }

    Ok(())
}
