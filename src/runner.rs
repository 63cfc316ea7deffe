//! One comparison run: scan both roots, pair, dispatch.
//!
//! Stages never overlap. Scanning and configuration failures abort the run;
//! comparison failures are recorded per entry.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::core::config::RunSettings;
use crate::core::errors::Result;
use crate::dispatch::comparator::Comparator;
use crate::dispatch::dispatcher::{DispatchReport, Dispatcher, JobOutcome, JobStatus};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use crate::pairing::pairer::{PairingMap, PairingSummary, Side};
use crate::scanner::walker::{DirectoryScanner, FileRecord};

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub source_root: PathBuf,
    pub target_root: PathBuf,
    pub source_files: usize,
    pub target_files: usize,
    pub pairing: PairingSummary,
    pub dispatch: DispatchReport,
    pub duration_ms: u64,
}

/// Scan + pair result, before any comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRun {
    pub source_files: usize,
    pub target_files: usize,
    pub pairs: PairingMap,
}

/// Orchestrates the scan → pair → dispatch pipeline for one [`RunSettings`].
pub struct Runner<'a> {
    settings: &'a RunSettings,
    log: JsonlWriter,
    on_file: Option<Box<dyn Fn(Side, &FileRecord) + 'a>>,
}

impl<'a> Runner<'a> {
    /// Runner logging to the activity log named in `settings`, if any.
    pub fn new(settings: &'a RunSettings) -> Self {
        Self {
            settings,
            log: JsonlWriter::from_optional(settings.jsonl_log.as_deref()),
            on_file: None,
        }
    }

    /// Replace the activity log writer.
    #[must_use]
    pub fn with_log(mut self, log: JsonlWriter) -> Self {
        self.log = log;
        self
    }

    /// Callback for every file accepted while scanning either root.
    #[must_use]
    pub fn with_scan_observer<F>(mut self, callback: F) -> Self
    where
        F: Fn(Side, &FileRecord) + 'a,
    {
        self.on_file = Some(Box::new(callback));
        self
    }

    pub fn settings(&self) -> &RunSettings {
        self.settings
    }

    /// Scan both roots and pair the results.
    pub fn pair(&mut self) -> Result<PairingRun> {
        let settings = self.settings;
        let source = self.scan_side(Side::Source, &settings.source_root)?;
        let target = self.scan_side(Side::Target, &settings.target_root)?;
        let pairs = PairingMap::pair(&source, &target);

        let summary = pairs.summary();
        self.log.write_entry(
            &LogEntry::new(EventType::PairingComplete, Severity::Info)
                .with_count(summary.names)
                .with_details(format!(
                    "married={} source_only={} target_only={} accumulated={}",
                    summary.married, summary.source_only, summary.target_only, summary.accumulated
                )),
        );

        Ok(PairingRun {
            source_files: source.len(),
            target_files: target.len(),
            pairs,
        })
    }

    /// Full run. `progress` is called after every comparison job.
    pub fn run<F>(
        &mut self,
        comparator: &dyn Comparator,
        dry_run: bool,
        mut progress: F,
    ) -> Result<RunReport>
    where
        F: FnMut(&JobOutcome),
    {
        let started = Instant::now();
        self.log.write_entry(
            &LogEntry::new(EventType::RunStart, Severity::Info)
                .with_paths([&self.settings.source_root, &self.settings.target_root])
                .with_details(format!("dry_run={dry_run}")),
        );

        let paired = self.pair()?;

        let log = &mut self.log;
        let dispatch = Dispatcher::new(comparator)
            .dry_run(dry_run)
            .with_progress(|outcome| {
                log.write_entry(&outcome_entry(outcome));
                progress(outcome);
            })
            .dispatch(&paired.pairs);

        let report = RunReport {
            source_root: self.settings.source_root.clone(),
            target_root: self.settings.target_root.clone(),
            source_files: paired.source_files,
            target_files: paired.target_files,
            pairing: paired.pairs.summary(),
            dispatch,
            duration_ms: elapsed_ms(started),
        };

        let mut done = LogEntry::new(EventType::RunComplete, Severity::Info)
            .with_count(report.dispatch.outcomes.len())
            .with_details(format!(
                "succeeded={} failed={} skipped={}",
                report.dispatch.succeeded(),
                report.dispatch.failed(),
                report.dispatch.skipped
            ));
        done.ok = Some(!report.dispatch.has_failures());
        done.duration_ms = Some(report.duration_ms);
        self.log.write_entry(&done);
        self.log.flush();

        Ok(report)
    }

    fn scan_side(&mut self, side: Side, root: &Path) -> Result<Vec<FileRecord>> {
        let started = Instant::now();
        let result = {
            let mut scanner = DirectoryScanner::new(self.settings.scan.clone());
            if let Some(observer) = self.on_file.as_deref() {
                scanner = scanner.with_observer(move |record| observer(side, record));
            }
            scanner.scan(root)
        };

        match result {
            Ok(records) => {
                let mut entry = LogEntry::new(EventType::ScanComplete, Severity::Info)
                    .with_paths([root])
                    .with_count(records.len())
                    .with_details(side.to_string());
                entry.duration_ms = Some(elapsed_ms(started));
                self.log.write_entry(&entry);
                Ok(records)
            }
            Err(err) => {
                self.log
                    .write_entry(&LogEntry::from_error(&err).with_paths([root]));
                self.log.flush();
                Err(err)
            }
        }
    }
}

fn outcome_entry(outcome: &JobOutcome) -> LogEntry {
    let (event, severity) = match outcome.status {
        JobStatus::Failed { .. } => (EventType::ComparisonFailed, Severity::Warning),
        JobStatus::Succeeded | JobStatus::Planned { .. } => {
            (EventType::ComparisonOk, Severity::Info)
        }
    };
    let mut entry = LogEntry::new(event, severity)
        .with_name(outcome.name.clone())
        .with_paths(&outcome.paths);
    entry.duration_ms = Some(outcome.duration_ms);
    match &outcome.status {
        JobStatus::Failed {
            error_code,
            message,
        } => {
            entry.ok = Some(false);
            entry.error_code = Some((*error_code).to_string());
            entry.error_message = Some(message.clone());
        }
        JobStatus::Planned { command } => {
            entry.details = Some(format!("planned: {}", command.join(" ")));
        }
        JobStatus::Succeeded => {
            entry.ok = Some(true);
            if !outcome.output.is_empty() {
                entry.details = Some(outcome.output.clone());
            }
        }
    }
    entry
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::PdError;
    use crate::dispatch::comparator::{ComparatorSettings, ComparisonOutput};
    use crate::scanner::walker::ScanOptions;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    struct CountingComparator {
        calls: RefCell<usize>,
    }

    impl Comparator for CountingComparator {
        fn program(&self) -> &str {
            "count"
        }

        fn command_line(&self, paths: &[&Path]) -> Vec<String> {
            paths.iter().map(|p| p.display().to_string()).collect()
        }

        fn compare(&self, _paths: &[&Path]) -> Result<ComparisonOutput> {
            *self.calls.borrow_mut() += 1;
            Ok(ComparisonOutput {
                exit_code: Some(0),
                ..ComparisonOutput::default()
            })
        }
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn settings(source: &Path, target: &Path, log: Option<PathBuf>) -> RunSettings {
        RunSettings {
            source_root: source.to_path_buf(),
            target_root: target.to_path_buf(),
            scan: ScanOptions::default(),
            comparator: ComparatorSettings {
                program: "count".to_string(),
                args: Vec::new(),
                expires: "day".to_string(),
                working_dir: source.to_path_buf(),
            },
            jsonl_log: log,
        }
    }

    #[test]
    fn end_to_end_with_metadata_filtering() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        touch(src.path(), "Test1.js");
        touch(src.path(), "Test2.js");
        touch(src.path(), "Test1.js-meta.xml");
        touch(dst.path(), "nested/Test1.js");
        touch(dst.path(), "Test1.js-meta.xml");

        let settings = settings(src.path(), dst.path(), None);
        let comparator = CountingComparator {
            calls: RefCell::new(0),
        };
        let report = Runner::new(&settings)
            .run(&comparator, false, |_| {})
            .unwrap();

        assert_eq!(report.source_files, 2);
        assert_eq!(report.target_files, 1);
        assert_eq!(report.pairing.married, 1);
        assert_eq!(report.dispatch.skipped, 1);
        assert_eq!(*comparator.calls.borrow(), 1);
    }

    #[test]
    fn missing_target_root_aborts_before_dispatch() {
        let src = TempDir::new().unwrap();
        touch(src.path(), "a.js");
        let settings = settings(src.path(), &src.path().join("missing"), None);
        let comparator = CountingComparator {
            calls: RefCell::new(0),
        };
        let err = Runner::new(&settings)
            .run(&comparator, false, |_| {})
            .unwrap_err();
        assert!(matches!(err, PdError::DirectoryAccess { .. }));
        assert_eq!(*comparator.calls.borrow(), 0);
    }

    #[test]
    fn scan_observer_reports_both_sides() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        touch(src.path(), "a.js");
        touch(dst.path(), "b.js");

        let settings = settings(src.path(), dst.path(), None);
        let seen = RefCell::new(Vec::new());
        let paired = Runner::new(&settings)
            .with_scan_observer(|side, record| seen.borrow_mut().push((side, record.name.clone())))
            .pair()
            .unwrap();

        assert_eq!(paired.pairs.len(), 2);
        assert_eq!(
            seen.into_inner(),
            vec![
                (Side::Source, "a.js".to_string()),
                (Side::Target, "b.js".to_string())
            ]
        );
    }

    #[test]
    fn activity_log_records_each_stage() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let logs = TempDir::new().unwrap();
        touch(src.path(), "a.js");
        touch(dst.path(), "a.js");
        let log_path = logs.path().join("run.jsonl");

        let settings = settings(src.path(), dst.path(), Some(log_path.clone()));
        let comparator = CountingComparator {
            calls: RefCell::new(0),
        };
        Runner::new(&settings)
            .run(&comparator, false, |_| {})
            .unwrap();

        let events: Vec<String> = fs::read_to_string(&log_path)
            .unwrap()
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            events,
            vec![
                "run_start",
                "scan_complete",
                "scan_complete",
                "pairing_complete",
                "comparison_ok",
                "run_complete"
            ]
        );
    }
}
