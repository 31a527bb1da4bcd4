// =============================================================================
// sink.rs — WHERE THE HARVEST ENDS UP
// =============================================================================
//
// After de-duplication the rows have to land somewhere. Each run writes one
// timestamped file:
//
//   scraped_data/job_listings_2024-05-01_10-15-00.json
//
// a pretty-printed JSON array of rows in the fixed column order. Before
// writing, files from earlier runs that are older than the retention window
// are swept away so the directory does not grow forever.
// =============================================================================

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info, warn};

use crate::models::ListingRow;

const FILE_PREFIX: &str = "job_listings_";
const FILE_EXTENSION: &str = "json";

/// Somewhere finished rows can be written.
pub trait RecordSink {
    /// Persist `rows` and return where they went.
    fn save(&self, rows: &[ListingRow]) -> Result<PathBuf>;
}

pub struct JsonFileSink {
    output_dir: PathBuf,
    retention_days: u32,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self { output_dir: output_dir.into(), retention_days }
    }

    /// Delete saved files older than `days`. Returns how many went.
    pub fn cleanup_old_files(&self, days: u32) -> usize {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(u64::from(days) * 24 * 60 * 60))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let entries = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %self.output_dir.display(), error = %err, "Nothing to clean up");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_saved_file(&path) {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "Could not read file age — skipping");
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(file = %path.display(), "Deleted old output file");
                    removed += 1;
                }
                Err(err) => warn!(file = %path.display(), error = %err, "Could not delete old output file"),
            }
        }
        removed
    }
}

impl RecordSink for JsonFileSink {
    fn save(&self, rows: &[ListingRow]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating output directory {}", self.output_dir.display()))?;

        self.cleanup_old_files(self.retention_days);

        let file_name = format!("{FILE_PREFIX}{}.{FILE_EXTENSION}", Local::now().format("%Y-%m-%d_%H-%M-%S"));
        let path = self.output_dir.join(file_name);

        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, rows).context("serializing job listings")?;
        writer.flush().with_context(|| format!("writing {}", path.display()))?;

        let path = path.canonicalize().unwrap_or(path);
        info!(file = %path.display(), rows = rows.len(), "Saved job listings");
        Ok(path)
    }
}

/// Run `sink.save` on the blocking pool so file I/O never stalls a
/// runtime worker.
pub async fn save_in_background<S>(sink: S, rows: Vec<ListingRow>) -> Result<PathBuf>
where
    S: RecordSink + Send + 'static,
{
    tokio::task::spawn_blocking(move || sink.save(&rows))
        .await
        .context("persistence task did not complete")?
}

fn is_saved_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX));
    let extension_matches = path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
    path.is_file() && name_matches && extension_matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;

    fn row(title: &str) -> ListingRow {
        ListingRow {
            source_platform: "Unstop.com".into(),
            job_title: title.into(),
            company_name: "Acme".into(),
            location: "Pune".into(),
            date_posted: "2024-05-01".into(),
            experience_required: "N/A".into(),
            salary_range: "Not Disclosed".into(),
            skills: "N/A".into(),
            description: "x".into(),
            job_url: format!("https://unstop.com/{title}"),
        }
    }

    fn age_file(path: &Path, days: u64) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60))
            .unwrap();
    }

    #[test]
    fn test_save_writes_rows_in_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out"), 7);
        let path = sink.save(&[row("a"), row("b")]).unwrap();

        assert!(path.is_absolute());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("job_listings_") && name.ends_with(".json"));

        let text = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert!(text.find("\"source_platform\"").unwrap() < text.find("\"job_url\"").unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_background_save_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path(), 7);
        let path = save_in_background(sink, vec![row("a"), row("b"), row("c")]).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_cleanup_only_removes_old_output_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("job_listings_2020-01-01_00-00-00.json");
        let fresh = dir.path().join("job_listings_2099-01-01_00-00-00.json");
        let unrelated = dir.path().join("notes.json");
        for path in [&old, &fresh, &unrelated] {
            fs::write(path, "[]").unwrap();
        }
        age_file(&old, 10);
        age_file(&unrelated, 10);

        let sink = JsonFileSink::new(dir.path(), 7);
        assert_eq!(sink.cleanup_old_files(7), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_cleanup_of_missing_directory_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("never-created"), 7);
        assert_eq!(sink.cleanup_old_files(7), 0);
    }
}
