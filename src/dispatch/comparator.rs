//! External comparator invocation.
//!
//! The comparator is a black box: it receives an expiry token and the paths of
//! one married entry, runs to completion, and reports through its exit status.
//! Arguments are passed as a list, never through a shell.

#![allow(missing_docs)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::core::errors::{PdError, Result};

/// How to launch the comparator for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparatorSettings {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the expiry flag (e.g. a script for an interpreter).
    pub args: Vec<String>,
    /// Expiry token passed as `--expires <token>`.
    pub expires: String,
    /// Working directory of every invocation (the source root).
    pub working_dir: PathBuf,
}

impl ComparatorSettings {
    /// Arguments following the program name.
    pub fn argv(&self, paths: &[&Path]) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::with_capacity(self.args.len() + 2 + paths.len());
        argv.extend(self.args.iter().map(OsString::from));
        argv.push("--expires".into());
        argv.push(self.expires.clone().into());
        argv.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        argv
    }
}

/// Captured result of one comparator process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComparisonOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ComparisonOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Seam between dispatch and the process that performs a comparison.
pub trait Comparator {
    /// Program name used in reports.
    fn program(&self) -> &str;

    /// Full command line (program first) for the given paths.
    fn command_line(&self, paths: &[&Path]) -> Vec<String>;

    /// Run one comparison. `Err` only when the process could not be run or
    /// its output could not be collected; a non-zero exit is `Ok`.
    fn compare(&self, paths: &[&Path]) -> Result<ComparisonOutput>;
}

/// Runs the configured program as a child process and waits for it.
#[derive(Debug, Clone)]
pub struct ProcessComparator {
    settings: ComparatorSettings,
}

impl ProcessComparator {
    pub fn new(settings: ComparatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ComparatorSettings {
        &self.settings
    }
}

impl Comparator for ProcessComparator {
    fn program(&self) -> &str {
        &self.settings.program
    }

    fn command_line(&self, paths: &[&Path]) -> Vec<String> {
        std::iter::once(self.settings.program.clone())
            .chain(
                self.settings
                    .argv(paths)
                    .into_iter()
                    .map(|arg| arg.to_string_lossy().into_owned()),
            )
            .collect()
    }

    fn compare(&self, paths: &[&Path]) -> Result<ComparisonOutput> {
        // `output()` drains stdout and stderr fully before reaping the child.
        let output = Command::new(&self.settings.program)
            .args(self.settings.argv(paths))
            .current_dir(&self.settings.working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| PdError::Invocation {
                program: self.settings.program.clone(),
                details: source.to_string(),
            })?;

        Ok(ComparisonOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
