//! Per-phase aggregation of import outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::importer::{ImportOutcome, SaveOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Source name, e.g. `tosback2` or `postgres`.
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub queued: u64,
    pub skipped: u64,
    /// Rejections keyed by `ImportError::kind()`.
    pub rejected: BTreeMap<&'static str, u64>,
    pub merged: u64,
    pub saved: u64,
    pub save_failed: u64,
    /// Source files that could not be parsed.
    pub unreadable_files: u64,
    /// Entries dropped inside otherwise readable source files.
    pub incomplete_entries: u64,
    /// Most descriptors in flight at once during this phase.
    pub peak_concurrency: usize,
    pub elapsed: Duration,
}

impl ImportReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            started_at: Utc::now(),
            queued: 0,
            skipped: 0,
            rejected: BTreeMap::new(),
            merged: 0,
            saved: 0,
            save_failed: 0,
            unreadable_files: 0,
            incomplete_entries: 0,
            peak_concurrency: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn record(&mut self, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::Skipped => self.skipped += 1,
            ImportOutcome::Rejected(e) => *self.rejected.entry(e.kind()).or_default() += 1,
            ImportOutcome::Merged(save) => {
                self.merged += 1;
                match save {
                    SaveOutcome::Saved(_) => self.saved += 1,
                    SaveOutcome::Failed(_) => self.save_failed += 1,
                    SaveOutcome::Empty => {}
                }
            }
        }
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }

    /// Descriptors that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.skipped + self.rejected_total() + self.merged
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} queued, {} merged ({} saved, {} save failures), {} skipped, {} rejected {:?}, {} unreadable files, {} incomplete entries, peak {} in flight, {:.1}s",
            self.source,
            self.queued,
            self.merged,
            self.saved,
            self.save_failed,
            self.skipped,
            self.rejected_total(),
            self.rejected,
            self.unreadable_files,
            self.incomplete_entries,
            self.peak_concurrency,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docimport_core::ImportError;
    use std::path::PathBuf;

    #[test]
    fn record_counts_each_outcome() {
        let mut report = ImportReport::new("test");
        report.record(&ImportOutcome::Skipped);
        report.record(&ImportOutcome::Rejected(ImportError::UnsupportedType("banana".into())));
        report.record(&ImportOutcome::Rejected(ImportError::UnsupportedType("kiwi".into())));
        report.record(&ImportOutcome::Merged(SaveOutcome::Saved(PathBuf::from("A.json"))));
        report.record(&ImportOutcome::Merged(SaveOutcome::Failed(ImportError::Persist {
            file: "B.json".into(),
            reason: "disk full".into(),
        })));

        assert_eq!(report.skipped, 1);
        assert_eq!(report.rejected["unsupported_type"], 2);
        assert_eq!(report.merged, 2);
        assert_eq!(report.saved, 1);
        assert_eq!(report.save_failed, 1);
        assert_eq!(report.finished(), 5);
        assert!(report.to_string().starts_with("test: 0 queued, 2 merged"));
    }
}
