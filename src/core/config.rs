//! Configuration system: settings file (TOML or properties) + env var
//! overrides + CLI overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PdError, Result};
use crate::core::properties;
use crate::dispatch::comparator::ComparatorSettings;
use crate::scanner::walker::ScanOptions;

/// Settings files tried, in order, when no explicit path is given.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["pairdiff.toml", "DiffCheckMe.properties"];

/// Full pairdiff configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub directories: DirectoriesConfig,
    pub scanner: ScannerConfig,
    pub comparator: ComparatorConfig,
    pub logging: LoggingConfig,
    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

/// The two trees being compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DirectoriesConfig {
    pub source: Option<PathBuf>,
    pub target: Option<PathBuf>,
}

/// Traversal filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    pub ignore_metadata_files: bool,
    pub metadata_extension: String,
    pub follow_symlinks: bool,
}

/// External diff service invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComparatorConfig {
    pub program: String,
    /// Extra arguments placed before `--expires` (e.g. `["diffchecker"]` with `npx`).
    pub args: Vec<String>,
    /// How long the uploaded diff lives on the service (passed through verbatim).
    pub expires: String,
}

/// Activity log destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub jsonl_log: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ignore_metadata_files: true,
            metadata_extension: ".xml".to_string(),
            follow_symlinks: false,
        }
    }
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            program: "diffchecker".to_string(),
            args: Vec::new(),
            expires: "day".to_string(),
        }
    }
}

/// Command-line overrides layered on top of file and env settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub include_metadata: bool,
    pub expires: Option<String>,
    pub comparator: Option<String>,
}

/// Immutable, fully resolved settings for a single comparison run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub source_root: PathBuf,
    pub target_root: PathBuf,
    pub scan: ScanOptions,
    pub comparator: ComparatorSettings,
    pub jsonl_log: Option<PathBuf>,
}

impl Config {
    /// Load config from an explicit path or the default search list, then
    /// apply env overrides.
    ///
    /// A missing default file is not an error; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Path::new("."), env_var)
    }

    /// Same as [`Config::load`] with an explicit search directory and env lookup.
    pub fn load_from<F>(path: Option<&Path>, search_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let located = match path {
            Some(explicit) if !explicit.exists() => {
                return Err(PdError::MissingConfig {
                    path: explicit.to_path_buf(),
                });
            }
            _ => Self::locate(path, search_dir),
        };

        let mut cfg = match &located {
            Some(file) => Self::read_file(file)?,
            None => Self::default(),
        };
        cfg.source_file = located;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Settings file that [`Config::load_from`] would read, if any.
    #[must_use]
    pub fn locate(path: Option<&Path>, search_dir: &Path) -> Option<PathBuf> {
        match path {
            Some(explicit) => explicit.exists().then(|| explicit.to_path_buf()),
            None => DEFAULT_CONFIG_FILES
                .iter()
                .map(|name| search_dir.join(name))
                .find(|candidate| candidate.is_file()),
        }
    }

    /// Parse a settings file, choosing the format by extension.
    pub fn read_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| PdError::io(path, source))?;
        let is_properties = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("properties"));
        if is_properties {
            Self::from_properties(&raw)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    /// Build a config from `.properties` text.
    pub fn from_properties(raw: &str) -> Result<Self> {
        let map = properties::parse_map(raw)?;
        let mut cfg = Self::default();

        if let Some(value) = map.get("sourceDirectory") {
            cfg.directories.source = Some(PathBuf::from(value));
        }
        if let Some(value) = map.get("targetDirectory") {
            cfg.directories.target = Some(PathBuf::from(value));
        }
        if let Some(value) = map.get("ignoreMetadataFiles") {
            cfg.scanner.ignore_metadata_files = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(value) = map.get("metadataExtension") {
            cfg.scanner.metadata_extension.clone_from(value);
        }
        if let Some(value) = map.get("followSymlinks") {
            cfg.scanner.follow_symlinks = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(value) = map.get("expires") {
            cfg.comparator.expires.clone_from(value);
        }
        if let Some(value) = map.get("comparator") {
            cfg.comparator.program.clone_from(value);
        }
        if let Some(value) = map.get("comparatorArgs") {
            cfg.comparator.args = value.split_whitespace().map(str::to_string).collect();
        }
        if let Some(value) = map.get("logFile") {
            cfg.logging.jsonl_log = Some(PathBuf::from(value));
        }
        Ok(cfg)
    }

    /// Apply command-line overrides and re-validate.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(source) = &overrides.source {
            self.directories.source = Some(source.clone());
        }
        if let Some(target) = &overrides.target {
            self.directories.target = Some(target.clone());
        }
        if overrides.include_metadata {
            self.scanner.ignore_metadata_files = false;
        }
        if let Some(expires) = &overrides.expires {
            self.comparator.expires.clone_from(expires);
        }
        if let Some(program) = &overrides.comparator {
            self.comparator.program.clone_from(program);
        }
        self.validate()?;
        Ok(self)
    }

    /// Scan options derived from the scanner section.
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            exclude_metadata: self.scanner.ignore_metadata_files,
            metadata_extension: self.scanner.metadata_extension.clone(),
            follow_symlinks: self.scanner.follow_symlinks,
        }
    }

    /// Resolve into the immutable per-run settings.
    ///
    /// Both directories are required; the source root doubles as the working
    /// directory of every comparator invocation.
    pub fn resolve(&self) -> Result<RunSettings> {
        let source_root = self
            .directories
            .source
            .clone()
            .ok_or(PdError::MissingSetting {
                key: "sourceDirectory",
            })?;
        let target_root = self
            .directories
            .target
            .clone()
            .ok_or(PdError::MissingSetting {
                key: "targetDirectory",
            })?;

        Ok(RunSettings {
            comparator: ComparatorSettings {
                program: self.comparator.program.clone(),
                args: self.comparator.args.clone(),
                expires: self.comparator.expires.clone(),
                working_dir: source_root.clone(),
            },
            source_root,
            target_root,
            scan: self.scan_options(),
            jsonl_log: self.logging.jsonl_log.clone(),
        })
    }

    fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PAIRDIFF_SOURCE_DIRECTORY") {
            self.directories.source = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("PAIRDIFF_TARGET_DIRECTORY") {
            self.directories.target = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("PAIRDIFF_IGNORE_METADATA_FILES") {
            self.scanner.ignore_metadata_files =
                parse_env_bool("PAIRDIFF_IGNORE_METADATA_FILES", &raw)?;
        }
        if let Some(raw) = lookup("PAIRDIFF_METADATA_EXTENSION") {
            self.scanner.metadata_extension = raw;
        }
        if let Some(raw) = lookup("PAIRDIFF_EXPIRES") {
            self.comparator.expires = raw;
        }
        if let Some(raw) = lookup("PAIRDIFF_COMPARATOR") {
            self.comparator.program = raw;
        }
        if let Some(raw) = lookup("PAIRDIFF_LOG_FILE") {
            self.logging.jsonl_log = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.scanner.metadata_extension.is_empty() {
            return Err(PdError::InvalidConfig {
                details: "scanner.metadata_extension must not be empty".to_string(),
            });
        }
        if self.comparator.program.trim().is_empty() {
            return Err(PdError::InvalidConfig {
                details: "comparator.program must not be empty".to_string(),
            });
        }
        if self.comparator.expires.trim().is_empty() {
            return Err(PdError::InvalidConfig {
                details: "comparator.expires must not be empty".to_string(),
            });
        }
        for (name, dir) in [
            ("directories.source", &self.directories.source),
            ("directories.target", &self.directories.target),
        ] {
            if dir.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(PdError::InvalidConfig {
                    details: format!("{name} must not be an empty path"),
                });
            }
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PdError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}
