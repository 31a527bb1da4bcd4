// =============================================================================
// dedup.rs — ONE LISTING, ONE ROW
// =============================================================================
//
// The same job shows up on LinkedIn via the aggregator, then again for the
// next keyword, then once more because the board re-indexed it mid-run.
// This module merges everything the dispatcher collected into one list
// where every job URL appears at most once.
//
// Rules:
//
// 1. The identity key is `job_url`. Nothing fuzzier: two postings with the
//    same text but different URLs are two rows.
//
// 2. First one in wins. Input order is completion order, so "first" means
//    "whichever task happened to finish first".
//
// 3. Records without a usable URL (blank or "N/A") are ALWAYS kept, even
//    when they are exact copies of each other. Without an identity we cannot
//    tell a duplicate from a different job that also lacks a URL, and
//    dropping a real job is worse than showing one twice.
//
// 4. Any blank field comes out as "N/A", so every row has ten real values.
//
// An exact HashSet does the bookkeeping. A probabilistic filter would
// eventually drop a job that was never seen.
// =============================================================================

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::models::{JobRecord, NOT_AVAILABLE};

/// Counts from one `process` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DedupReport {
    pub input: usize,
    pub kept: usize,
    pub duplicates_dropped: usize,
    /// Kept records that had no identity key.
    pub unkeyed: usize,
}

#[derive(Debug, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Merge, de-duplicate and normalize. Consumes the input and returns a
    /// new list; running it again on its own output changes nothing.
    pub fn process(&self, records: Vec<JobRecord>) -> (Vec<JobRecord>, DedupReport) {
        let mut report = DedupReport { input: records.len(), ..DedupReport::default() };

        if records.is_empty() {
            warn!("No job records to process — nothing to de-duplicate");
            return (Vec::new(), report);
        }

        info!(total = records.len(), "De-duplicating collected job records");

        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        let mut unique = Vec::with_capacity(records.len());

        for record in records {
            let record = fill_blanks(record);

            let Some(key) = record.identity_key() else {
                warn!(title = %record.job_title, source = %record.source_platform, "Job has no URL — cannot de-duplicate, keeping it");
                report.unkeyed += 1;
                unique.push(record);
                continue;
            };

            if seen.insert(key.to_string()) {
                unique.push(record);
            } else {
                debug!(url = key, "Duplicate job dropped");
                report.duplicates_dropped += 1;
            }
        }

        report.kept = unique.len();
        if report.duplicates_dropped > 0 {
            info!(removed = report.duplicates_dropped, "Removed duplicate job listings");
        }
        info!(unique = report.kept, unkeyed = report.unkeyed, "De-duplication complete");

        (unique, report)
    }
}

/// Blank or whitespace-only fields become "N/A".
fn fill_blanks(mut record: JobRecord) -> JobRecord {
    for field in [
        &mut record.source_platform,
        &mut record.job_id,
        &mut record.job_title,
        &mut record.company_name,
        &mut record.job_url,
        &mut record.location,
        &mut record.date_posted,
        &mut record.experience_required,
        &mut record.salary_range,
        &mut record.skills,
        &mut record.description,
    ] {
        if field.trim().is_empty() {
            *field = NOT_AVAILABLE.to_string();
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::COLUMNS;
    use proptest::prelude::*;

    fn job(url: &str, title: &str) -> JobRecord {
        JobRecord {
            source_platform: "Unstop.com".into(),
            job_id: "1".into(),
            job_title: title.into(),
            company_name: "Acme".into(),
            job_url: url.into(),
            location: "Pune".into(),
            date_posted: "2024-05-01".into(),
            experience_required: "Fresher".into(),
            salary_range: "Not Disclosed".into(),
            skills: "Rust".into(),
            description: "Build things".into(),
        }
    }

    fn urls(records: &[JobRecord]) -> Vec<&str> {
        records.iter().map(|r| r.job_url.as_str()).collect()
    }

    #[test]
    fn test_three_source_scenario() {
        let first = vec![job("a", "a1"), job("a", "a2"), job("b", "b1")];
        let second = vec![job("b", "b2")];
        let third = vec![job("N/A", "n1"), job("N/A", "n2")];
        let merged: Vec<JobRecord> = [first, second, third].concat();

        let (out, report) = Deduplicator::new().process(merged);
        assert_eq!(out.len(), 4);
        assert_eq!(urls(&out), vec!["a", "b", "N/A", "N/A"]);
        assert_eq!(report, DedupReport { input: 6, kept: 4, duplicates_dropped: 2, unkeyed: 2 });
    }

    #[test]
    fn test_first_encountered_duplicate_is_retained() {
        let (out, _) = Deduplicator::new().process(vec![job("x", "first"), job("y", "other"), job("x", "second")]);
        assert_eq!(out[0].job_title, "first");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_sentinel_and_blank_urls_are_never_dropped() {
        let input = vec![job("N/A", "t"), job("N/A", "t"), job("", "t"), job("  ", "t")];
        let (out, report) = Deduplicator::new().process(input);
        assert_eq!(out.len(), 4);
        assert_eq!(report.unkeyed, 4);
        assert!(out.iter().all(|r| r.job_url == "N/A"));
    }

    #[test]
    fn test_process_is_idempotent() {
        let input = vec![job("a", "1"), job("", "2"), job("a", "3"), job("b", "4"), job("N/A", "5"), job("N/A", "5")];
        let dedup = Deduplicator::new();
        let (once, _) = dedup.process(input);
        let (twice, _) = dedup.process(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_two_outputs_share_a_real_url() {
        let input: Vec<JobRecord> = (0..50).map(|i| job(&format!("u{}", i % 7), "t")).collect();
        let (out, _) = Deduplicator::new().process(input);
        let keyed: Vec<&str> = out.iter().filter_map(|r| r.identity_key()).collect();
        let distinct: HashSet<&str> = keyed.iter().copied().collect();
        assert_eq!(keyed.len(), distinct.len());
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn test_blank_fields_are_filled_and_rows_are_complete() {
        let mut record = job("z", "t");
        record.company_name = String::new();
        record.skills = "   ".into();
        let (out, _) = Deduplicator::new().process(vec![record]);
        assert_eq!(out[0].company_name, "N/A");
        assert_eq!(out[0].skills, "N/A");

        let row = serde_json::to_value(out[0].to_row()).unwrap();
        let object = row.as_object().unwrap();
        assert_eq!(object.len(), COLUMNS.len());
        assert!(object.values().all(|v| v.as_str().is_some_and(|s| !s.is_empty())));
    }

    fn url_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("N/A".to_string()),
            Just(String::new()),
            Just("  ".to_string()),
            "[a-f]{1,2}".prop_map(|path| format!("https://jobs.example/{path}")),
        ]
    }

    fn is_sentinel(url: &str) -> bool {
        url.trim().is_empty() || url == "N/A"
    }

    proptest! {
        #[test]
        fn test_dedup_is_idempotent_for_any_input(urls in prop::collection::vec(url_strategy(), 0..60)) {
            let input: Vec<JobRecord> = urls.iter().map(|u| job(u, "t")).collect();
            let dedup = Deduplicator::new();
            let (once, _) = dedup.process(input);
            let (twice, _) = dedup.process(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_keys_unique_and_sentinels_survive_for_any_input(urls in prop::collection::vec(url_strategy(), 0..60)) {
            let input: Vec<JobRecord> = urls.iter().enumerate().map(|(i, u)| job(u, &i.to_string())).collect();
            let (out, report) = Deduplicator::new().process(input);

            let keyed: Vec<&str> = out.iter().filter_map(|r| r.identity_key()).collect();
            let distinct: HashSet<&str> = keyed.iter().copied().collect();
            prop_assert_eq!(keyed.len(), distinct.len());

            let sentinels_in = urls.iter().filter(|u| is_sentinel(u)).count();
            prop_assert_eq!(out.len() - keyed.len(), sentinels_in);
            prop_assert_eq!(report.unkeyed, sentinels_in);

            // The first record seen for each URL is the one kept.
            for record in out.iter().filter(|r| r.identity_key().is_some()) {
                let first = urls.iter().position(|u| *u == record.job_url).unwrap();
                prop_assert_eq!(&record.job_title, &first.to_string());
            }
        }
    }

    #[test]
    fn test_empty_input_is_a_no_op() {
        let (out, report) = Deduplicator::new().process(Vec::new());
        assert!(out.is_empty());
        assert_eq!(report, DedupReport::default());
    }
}
