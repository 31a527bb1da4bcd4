// =============================================================================
// logging.rs — TWO PLACES FOR EVERY LOG LINE
// =============================================================================
//
// The console gets what RUST_LOG asks for (info by default), pretty or JSON.
// Every run also gets its own file, logs/run_2024-05-01_10-15-00.log, at
// DEBUG, so the page-by-page story of a harvest is still around after the
// terminal scrolled away.
//
// File writes go through tracing-appender's non-blocking worker. The
// `WorkerGuard` flushes it on drop, so main holds the returned `LogSession`
// until the very end of the run.
// =============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::ValueEnum;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Dependency chatter stays out of the debug file.
const FILE_FILTER: &str = "debug,hyper=info,hyper_util=info,reqwest=info,rustls=info,h2=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Keeps the file writer alive. Dropping it flushes the run log.
pub struct LogSession {
    _guard: Option<WorkerGuard>,
}

/// Open `dir/run_{timestamp}.log` behind a non-blocking writer.
pub fn open_run_log(dir: &Path) -> Result<(NonBlocking, WorkerGuard, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;

    let stem = format!("run_{}", Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(stem.as_str())
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("opening run log in {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((writer, guard, dir.join(format!("{stem}.log"))))
}

/// Install the global subscriber. A log directory that cannot be opened
/// costs the file layer, not the run.
pub fn init(format: LogFormat, log_dir: &Path) -> Result<LogSession> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Pretty => fmt::layer().with_target(false).with_thread_names(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    };

    let (file_layer, guard, file, file_error) = match open_run_log(log_dir) {
        Ok((writer, guard, path)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard), Some(path), None)
        }
        Err(err) => (None, None, None, Some(err)),
    };

    tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    match (&file, file_error) {
        (Some(path), _) => tracing::info!(file = %path.display(), "📝 Writing run log"),
        (None, Some(err)) => tracing::warn!(error = %err, "Run log file disabled"),
        (None, None) => {}
    }

    Ok(LogSession { _guard: guard })
}
