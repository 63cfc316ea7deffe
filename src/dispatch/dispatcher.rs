//! Sequential dispatch of married entries to a [`Comparator`].
//!
//! Entries are visited in name order. Orphans are skipped. Each married entry
//! gets exactly one invocation, and a failed invocation never stops the run.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::core::errors::PdError;
use crate::dispatch::comparator::Comparator;
use crate::pairing::pairer::PairingMap;

/// Result of one married entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Dry run: the command that would have been executed.
    Planned { command: Vec<String> },
    Succeeded,
    Failed {
        error_code: &'static str,
        message: String,
    },
}

/// Outcome record for one comparison job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub name: String,
    pub paths: Vec<PathBuf>,
    #[serde(flatten)]
    pub status: JobStatus,
    /// Trimmed stdout when the comparator succeeded (typically the diff link),
    /// trimmed stderr when it exited non-zero, empty otherwise.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
    pub duration_ms: u64,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded)
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, JobStatus::Failed { .. })
    }
}

/// Everything a dispatch pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<JobOutcome>,
    /// Entries not eligible for comparison.
    pub skipped: usize,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.status, JobStatus::Planned { .. }))
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    pub fn planned(&self) -> usize {
        self.outcomes.len() - self.attempted()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Drives a [`Comparator`] over a [`PairingMap`].
pub struct Dispatcher<'a> {
    comparator: &'a dyn Comparator,
    dry_run: bool,
    progress: Option<Box<dyn FnMut(&JobOutcome) + 'a>>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(comparator: &'a dyn Comparator) -> Self {
        Self {
            comparator,
            dry_run: false,
            progress: None,
        }
    }

    /// Plan jobs without starting any process.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Callback invoked after each job completes, before the next one starts.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&JobOutcome) + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn dispatch(&mut self, pairs: &PairingMap) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (name, entry) in pairs.iter() {
            if !entry.is_married() {
                report.skipped += 1;
                continue;
            }

            let paths = entry.paths();
            let outcome = self.run_job(name, &paths);
            if let Some(progress) = self.progress.as_mut() {
                progress(&outcome);
            }
            report.outcomes.push(outcome);
        }

        report
    }

    fn run_job(&self, name: &str, paths: &[&Path]) -> JobOutcome {
        let started = Instant::now();
        let (status, output) = if self.dry_run {
            (
                JobStatus::Planned {
                    command: self.comparator.command_line(paths),
                },
                String::new(),
            )
        } else {
            match self.comparator.compare(paths) {
                Ok(out) if out.success() => (JobStatus::Succeeded, out.stdout.trim().to_string()),
                Ok(out) => {
                    let err = PdError::ComparatorExit {
                        program: self.comparator.program().to_string(),
                        code: out.exit_code.unwrap_or(-1),
                    };
                    (failed(&err), out.stderr.trim().to_string())
                }
                Err(err) => (failed(&err), String::new()),
            }
        };

        JobOutcome {
            name: name.to_string(),
            paths: paths.iter().map(|p| p.to_path_buf()).collect(),
            status,
            output,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn failed(err: &PdError) -> JobStatus {
    JobStatus::Failed {
        error_code: err.code(),
        message: err.to_string(),
    }
}
